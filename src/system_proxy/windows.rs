// src/system_proxy/windows.rs
use crate::error::{PacError, Result};

#[cfg(target_os = "windows")]
const INTERNET_SETTINGS: &str =
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Internet Settings";

#[cfg(target_os = "windows")]
pub fn lookup() -> Result<String> {
    // `reg query` exits non-zero when the value does not exist.
    let out = super::run("reg", &["query", INTERNET_SETTINGS, "/v", "AutoConfigURL"])
        .map_err(|_| PacError::PacUrlNotFound)?;
    parse_reg_query(&out)
}

/// Parses `reg query ... /v AutoConfigURL` output:
///
/// ```text
/// HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Internet Settings
///     AutoConfigURL    REG_SZ    http://wpad/wpad.dat
/// ```
pub fn parse_reg_query(output: &str) -> Result<String> {
    for line in output.lines() {
        let Some(rest) = line.trim_start().strip_prefix("AutoConfigURL") else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(value) = rest
            .strip_prefix("REG_SZ")
            .or_else(|| rest.strip_prefix("REG_EXPAND_SZ"))
        else {
            continue;
        };
        let url = value.trim();
        if url.is_empty() {
            return Err(PacError::PacUrlEmpty);
        }
        return Ok(url.to_string());
    }
    Err(PacError::PacUrlNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_registry_value() {
        let out = "\r\nHKEY_CURRENT_USER\\Software\\Microsoft\\Windows\\CurrentVersion\\Internet Settings\r\n    AutoConfigURL    REG_SZ    http://wpad.corp/wpad.dat\r\n\r\n";
        assert_eq!(parse_reg_query(out).unwrap(), "http://wpad.corp/wpad.dat");
    }

    #[test]
    fn empty_and_missing_values() {
        let out = "HKEY_CURRENT_USER\\...\\Internet Settings\n    AutoConfigURL    REG_SZ    \n";
        assert!(matches!(parse_reg_query(out), Err(PacError::PacUrlEmpty)));
        let out = "HKEY_CURRENT_USER\\...\\Internet Settings\n    ProxyEnable    REG_DWORD    0x0\n";
        assert!(matches!(parse_reg_query(out), Err(PacError::PacUrlNotFound)));
    }
}
