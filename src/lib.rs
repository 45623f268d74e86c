// src/lib.rs
//! Proxy auto-config (PAC) support: fetch a PAC script, run it in a sandboxed
//! QuickJS interpreter with the standard helper functions, and turn its
//! `FindProxyForURL` answer into a proxy endpoint.

pub mod config;
pub mod error;
pub mod log;
pub mod pac;
pub mod system_proxy;

pub use config::{Limits, PacConfig};
pub use error::{PacError, Result};
pub use pac::{FailurePolicy, Loader, PacProxy, ProxyEndpoint, ProxyScheme};

/// Looks up the system PAC URL, loads that script with default limits and
/// asks it which proxy to use for `url`.
///
/// `Ok(None)` means connect directly.
///
/// ```no_run
/// match pacproxy::find_proxy_for_url("https://example.com/")? {
///     Some(proxy) => println!("{proxy}"),
///     None => println!("DIRECT"),
/// }
/// # Ok::<(), pacproxy::PacError>(())
/// ```
pub fn find_proxy_for_url(url: &str) -> Result<Option<ProxyEndpoint>> {
    let pac_url = system_proxy::pac_url()?;
    let proxy = Loader::new(&PacConfig::default()).load(&pac_url)?;
    proxy.find_proxy_for_str(url)
}
