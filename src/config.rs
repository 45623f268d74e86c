// src/config.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_SCRIPT_SIZE: u64 = 1 << 20;
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DNS_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// User-facing limits for loading and running a PAC script.
///
/// Every field follows the same rule: `0` selects the built-in default and a
/// negative value disables the limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacConfig {
    /// Maximum script size in bytes.
    pub max_script_size: i64,
    /// Wall-clock budget for top-level execution and for each
    /// `FindProxyForURL` call, in milliseconds.
    pub script_timeout_ms: i64,
    /// Budget for a single `dnsResolve`/`isResolvable` lookup, in milliseconds.
    pub dns_lookup_timeout_ms: i64,
    /// Budget for fetching the script over HTTP, in milliseconds.
    pub http_timeout_ms: i64,
}

/// Limits after defaulting. `None` means the limit is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_script_size: Option<u64>,
    pub script_timeout: Option<Duration>,
    pub dns_lookup_timeout: Option<Duration>,
    pub http_timeout: Option<Duration>,
}

impl PacConfig {
    pub fn normalize(&self) -> Limits {
        Limits {
            max_script_size: limit(self.max_script_size, DEFAULT_MAX_SCRIPT_SIZE),
            script_timeout: limit(self.script_timeout_ms, millis(DEFAULT_SCRIPT_TIMEOUT))
                .map(Duration::from_millis),
            dns_lookup_timeout: limit(self.dns_lookup_timeout_ms, millis(DEFAULT_DNS_LOOKUP_TIMEOUT))
                .map(Duration::from_millis),
            http_timeout: limit(self.http_timeout_ms, millis(DEFAULT_HTTP_TIMEOUT))
                .map(Duration::from_millis),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        PacConfig::default().normalize()
    }
}

fn limit(raw: i64, default: u64) -> Option<u64> {
    match raw {
        0 => Some(default),
        n if n < 0 => None,
        n => Some(n as u64),
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}
