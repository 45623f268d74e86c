// src/system_proxy/macos.rs
use crate::error::{PacError, Result};

const PAC_URL_KEY: &str = "ProxyAutoConfigURLString";

#[cfg(target_os = "macos")]
pub fn lookup() -> Result<String> {
    let out = super::run("scutil", &["--proxy"])?;
    parse_scutil(&out)
}

/// Parses `scutil --proxy` output:
///
/// ```text
/// <dictionary> {
///   ProxyAutoConfigEnable : 1
///   ProxyAutoConfigURLString : http://wpad/wpad.dat
/// }
/// ```
pub fn parse_scutil(output: &str) -> Result<String> {
    for line in output.lines() {
        let Some((key, value)) = line.split_once(" : ") else {
            continue;
        };
        if key.trim() != PAC_URL_KEY {
            continue;
        }
        let url = value.trim();
        if url.is_empty() {
            return Err(PacError::PacUrlEmpty);
        }
        return Ok(url.to_string());
    }
    Err(PacError::PacUrlNotFound)
}
