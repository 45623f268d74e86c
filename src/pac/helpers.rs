// src/pac/helpers.rs
//! The host functions a PAC script can call, written against plain Rust
//! values so they can be exercised without an interpreter.

use super::datetime::{self, Clock};
use super::dns::{resolve_ip, Resolve};
use regex::Regex;
use std::net::IpAddr;
use std::sync::Arc;

/// A script argument as seen by a helper.
#[derive(Debug, Clone, PartialEq)]
pub enum PacArg {
    Str(String),
    Num(f64),
    /// Any other value, already converted with the script's `String()`
    /// semantics (`undefined`, `null`, `true`, objects, ...).
    Other(String),
}

impl PacArg {
    /// The argument as text, the way the script would print it.
    pub fn text(&self) -> String {
        match self {
            PacArg::Str(s) | PacArg::Other(s) => s.clone(),
            PacArg::Num(n) => format_number(*n),
        }
    }

    /// Integral value of the argument. Strings are trimmed and parsed;
    /// numbers must have no fractional part.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PacArg::Num(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Some(*n as i64)
                } else {
                    None
                }
            }
            PacArg::Str(s) | PacArg::Other(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PacArg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PacArg {
    fn from(s: &str) -> Self {
        PacArg::Str(s.to_string())
    }
}

impl From<i64> for PacArg {
    fn from(n: i64) -> Self {
        PacArg::Num(n as f64)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// The collaborators helpers need: name resolution and the current time.
#[derive(Clone)]
pub struct HelperEnv {
    pub resolver: Arc<dyn Resolve>,
    pub clock: Arc<dyn Clock>,
}

impl HelperEnv {
    pub fn new(resolver: Arc<dyn Resolve>, clock: Arc<dyn Clock>) -> Self {
        Self { resolver, clock }
    }

    pub fn is_resolvable(&self, host: &str) -> bool {
        matches!(self.resolver.lookup(host), Ok(addrs) if !addrs.is_empty())
    }

    pub fn dns_resolve(&self, host: &str) -> String {
        match self.resolver.lookup(host) {
            Ok(addrs) => addrs.first().map(|ip| ip.to_string()).unwrap_or_default(),
            Err(_) => String::new(),
        }
    }

    pub fn is_in_net(&self, host: &str, pattern: &str, mask: &str) -> bool {
        match resolve_ip(self.resolver.as_ref(), host) {
            Some(ip) => ip_matches(ip, pattern, mask),
            None => false,
        }
    }

    pub fn weekday_range(&self, args: &[PacArg]) -> bool {
        datetime::weekday_range(args, self.clock.as_ref())
    }

    pub fn date_range(&self, args: &[PacArg]) -> bool {
        datetime::date_range(args, self.clock.as_ref())
    }

    pub fn time_range(&self, args: &[PacArg]) -> bool {
        datetime::time_range(args, self.clock.as_ref())
    }
}

pub fn is_plain_host_name(host: &str) -> bool {
    !host.contains('.')
}

pub fn dns_domain_is(host: &str, domain: &str) -> bool {
    host.ends_with(domain)
}

pub fn local_host_or_domain_is(host: &str, hostdom: &str) -> bool {
    host == hostdom || hostdom.ends_with(&format!(".{host}"))
}

pub fn dns_domain_levels(host: &str) -> usize {
    host.matches('.').count()
}

/// `address AND mask == pattern AND mask`, byte by byte. All three must be
/// the same family once IPv4-mapped IPv6 addresses are folded back to IPv4.
pub fn ip_matches(ip: IpAddr, pattern: &str, mask: &str) -> bool {
    let (Ok(pattern), Ok(mask)) = (pattern.parse::<IpAddr>(), mask.parse::<IpAddr>())
    else {
        return false;
    };
    match (ip.to_canonical(), pattern.to_canonical(), mask.to_canonical()) {
        (IpAddr::V4(ip), IpAddr::V4(pattern), IpAddr::V4(mask)) => {
            masked_eq(&ip.octets(), &pattern.octets(), &mask.octets())
        }
        (IpAddr::V6(ip), IpAddr::V6(pattern), IpAddr::V6(mask)) => {
            masked_eq(&ip.octets(), &pattern.octets(), &mask.octets())
        }
        _ => false,
    }
}

fn masked_eq(ip: &[u8], pattern: &[u8], mask: &[u8]) -> bool {
    ip.iter()
        .zip(pattern)
        .zip(mask)
        .all(|((a, p), m)| a & m == p & m)
}

/// The first non-loopback IPv4 address among the host's interfaces, or
/// `""` when there is none.
pub fn my_ip_address() -> String {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => first_non_loopback_ipv4(interfaces.iter().map(|iface| iface.ip())),
        Err(_) => String::new(),
    }
}

fn first_non_loopback_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> String {
    addrs
        .into_iter()
        .find_map(|ip| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() => Some(v4.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Shell glob match: `*` matches any run of characters, `?` exactly one,
/// `[...]` a character class (`!` or `^` negates, `a-z` ranges), and `\`
/// escapes the next character. A malformed pattern never matches.
pub fn sh_exp_match(text: &str, pattern: &str) -> bool {
    match glob_to_regex(pattern) {
        Some(expr) => Regex::new(&expr).map(|re| re.is_match(text)).unwrap_or(false),
        None => false,
    }
}

fn glob_to_regex(pattern: &str) -> Option<String> {
    let mut out = String::from("(?s)^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => out.push_str(&regex::escape(&chars.next()?.to_string())),
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    out.push('^');
                }
                let mut members = 0;
                loop {
                    match chars.next()? {
                        ']' if members > 0 => break,
                        '\\' => out.push_str(&regex::escape(&chars.next()?.to_string())),
                        '-' if members > 0 && chars.peek() != Some(&']') => out.push('-'),
                        c => out.push_str(&regex::escape(&c.to_string())),
                    }
                    members += 1;
                }
                out.push(']');
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    Some(out)
}
