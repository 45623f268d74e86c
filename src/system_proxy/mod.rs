// src/system_proxy/mod.rs
use crate::error::{PacError, Result};
use std::process::Command;

pub mod linux;
pub mod macos;
pub mod windows;

/// Returns the PAC URL configured for the current user.
///
/// - Linux: GNOME `gsettings`, then KDE `kreadconfig5`
/// - macOS: `scutil --proxy`
/// - Windows: the `AutoConfigURL` registry value
pub fn pac_url() -> Result<String> {
    #[cfg(target_os = "linux")]
    let found = linux::lookup();
    #[cfg(target_os = "macos")]
    let found = macos::lookup();
    #[cfg(target_os = "windows")]
    let found = windows::lookup();
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    let found: Result<String> = Err(PacError::PacUrlNotFound);

    match &found {
        Ok(url) => tracing::debug!(target: "pacproxy", pac_url = %url, "found system PAC URL"),
        Err(err) => tracing::debug!(target: "pacproxy", %err, "no system PAC URL"),
    }
    found
}

/// Runs `program` and returns its stdout. A non-zero exit is an error.
#[allow(dead_code)]
fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| PacError::SystemLookup(format!("failed to run {program}: {e}")))?;

    if !output.status.success() {
        return Err(PacError::SystemLookup(format!(
            "{program} exited with {}",
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
