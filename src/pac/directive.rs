// src/pac/directive.rs
use crate::error::{PacError, Result};
use std::fmt;
use url::Url;

/// One `;`-separated token of a `FindProxyForURL` return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    Direct,
    /// `PROXY host:port`
    Proxy(&'a str),
    /// `SOCKS host:port`
    Socks(&'a str),
    Unrecognized(&'a str),
}

impl<'a> Directive<'a> {
    pub fn classify(token: &'a str) -> Self {
        if token.starts_with("DIRECT") {
            Directive::Direct
        } else if let Some(rest) = token.strip_prefix("PROXY ") {
            Directive::Proxy(rest.trim())
        } else if let Some(rest) = token.strip_prefix("SOCKS ") {
            Directive::Socks(rest.trim())
        } else {
            Directive::Unrecognized(token)
        }
    }
}

/// Splits a directive string into trimmed, non-empty tokens, in order.
pub fn directives(raw: &str) -> impl Iterator<Item = Directive<'_>> {
    raw.split(';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Directive::classify)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Http,
    Socks5,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Socks5 => "socks5",
        }
    }
}

/// A concrete proxy to connect through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    scheme: ProxyScheme,
    authority: String,
    url: Url,
}

impl ProxyEndpoint {
    pub fn new(scheme: ProxyScheme, authority: &str) -> Result<Self> {
        let url = Url::parse(&format!("{}://{}", scheme.as_str(), authority)).map_err(|source| {
            PacError::InvalidProxy {
                address: authority.to_string(),
                source,
            }
        })?;
        Ok(Self {
            scheme,
            authority: authority.to_string(),
            url,
        })
    }

    pub fn scheme(&self) -> ProxyScheme {
        self.scheme
    }

    /// `host:port` exactly as the script returned it.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme.as_str(), self.authority)
    }
}

/// Picks the first usable directive. `Ok(None)` means connect directly.
///
/// Unrecognized tokens are skipped; only when nothing in the list is usable
/// does this fail with [`PacError::NoValidProxy`].
pub fn parse(raw: &str) -> Result<Option<ProxyEndpoint>> {
    for directive in directives(raw) {
        match directive {
            Directive::Direct => return Ok(None),
            Directive::Proxy(authority) => {
                return ProxyEndpoint::new(ProxyScheme::Http, authority).map(Some)
            }
            Directive::Socks(authority) => {
                return ProxyEndpoint::new(ProxyScheme::Socks5, authority).map(Some)
            }
            Directive::Unrecognized(_) => continue,
        }
    }
    Err(PacError::NoValidProxy(raw.to_string()))
}
