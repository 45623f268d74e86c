// src/pac/dns.rs
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Forward name resolution used by `dnsResolve`, `isResolvable` and `isInNet`.
pub trait Resolve: Send + Sync {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// The operating system resolver. With a timeout set, each lookup runs on a
/// short-lived thread and the caller stops waiting once the timeout elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver {
    timeout: Option<Duration>,
}

impl SystemResolver {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Resolve for SystemResolver {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let Some(timeout) = self.timeout else {
            return lookup_blocking(host);
        };

        let (tx, rx) = mpsc::channel();
        let owned = host.to_string();
        thread::Builder::new()
            .name("pac-dns".into())
            .spawn(move || {
                let _ = tx.send(lookup_blocking(&owned));
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("DNS lookup for {host} timed out"),
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("DNS lookup for {host} aborted"),
            )),
        }
    }
}

fn lookup_blocking(host: &str) -> io::Result<Vec<IpAddr>> {
    let mut addrs: Vec<IpAddr> = Vec::new();
    for addr in (host, 0).to_socket_addrs()? {
        if !addrs.contains(&addr.ip()) {
            addrs.push(addr.ip());
        }
    }
    Ok(addrs)
}

/// Parses `host` as an address literal, resolving it otherwise. Returns the
/// first address.
pub fn resolve_ip(resolver: &dyn Resolve, host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    resolver.lookup(host).ok()?.into_iter().next()
}
