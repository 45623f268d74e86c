// src/system_proxy/linux.rs
use crate::error::{PacError, Result};

/// GNOME first, then KDE.
#[cfg(target_os = "linux")]
pub fn lookup() -> Result<String> {
    gnome().or_else(|gnome_err| {
        tracing::debug!(target: "pacproxy", err = %gnome_err, "no GNOME PAC URL, trying KDE");
        kde()
    })
}

#[cfg(target_os = "linux")]
fn gnome() -> Result<String> {
    let out = super::run("gsettings", &["get", "org.gnome.system.proxy", "autoconfig-url"])?;
    parse_gsettings(&out)
}

#[cfg(target_os = "linux")]
fn kde() -> Result<String> {
    let out = super::run(
        "kreadconfig5",
        &["--group", "Proxy Settings", "--key", "ProxyConfigScript"],
    )?;
    parse_kreadconfig(&out)
}

/// Parses `gsettings get org.gnome.system.proxy autoconfig-url` output,
/// e.g. `'http://wpad/wpad.dat'`.
pub fn parse_gsettings(output: &str) -> Result<String> {
    let url = output.trim().trim_matches('\'');
    if url.is_empty() {
        return Err(PacError::PacUrlNotFound);
    }
    Ok(url.to_string())
}

/// Parses `kreadconfig5 --key ProxyConfigScript` output.
pub fn parse_kreadconfig(output: &str) -> Result<String> {
    let url = output.trim();
    if url.is_empty() {
        return Err(PacError::PacUrlNotFound);
    }
    Ok(url.to_string())
}
