// src/pac/proxy.rs
use super::datetime::{Clock, SystemClock};
use super::directive::{self, ProxyEndpoint};
use super::dns::{Resolve, SystemResolver};
use super::downloader::{read_script, HttpFetcher, ScriptFetcher};
use super::engine::QuickJsHost;
use super::evaluator::Evaluator;
use super::helpers::HelperEnv;
use crate::config::{Limits, PacConfig};
use crate::error::{PacError, Result};
use crate::log::LogSink;
use crate::{log_debug, log_error, log_info, log_warn};
use std::fmt;
use std::sync::Arc;
use url::{Host, Url};

/// Builds ready-to-use [`PacProxy`] instances.
///
/// The configuration is normalized once, here, before any I/O happens.
#[derive(Clone)]
pub struct Loader {
    limits: Limits,
    fetcher: Option<Arc<dyn ScriptFetcher>>,
    log: LogSink,
    resolver: Option<Arc<dyn Resolve>>,
    clock: Arc<dyn Clock>,
}

impl Loader {
    pub fn new(config: &PacConfig) -> Self {
        Self {
            limits: config.normalize(),
            fetcher: None,
            log: LogSink::default(),
            resolver: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_log_sink(mut self, log: LogSink) -> Self {
        self.log = log;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetches the script at `source`, runs its top-level code and returns the
    /// loaded instance.
    pub fn load(&self, source: &str) -> Result<PacProxy> {
        log_info!(self.log, "fetching PAC script", "source" => source);

        let fetcher: Arc<dyn ScriptFetcher> = match &self.fetcher {
            Some(fetcher) => fetcher.clone(),
            None => Arc::new(HttpFetcher::new(self.limits.http_timeout)?),
        };

        let body = fetcher.fetch(source).map_err(|err| {
            log_error!(self.log, "failed to fetch PAC script", "source" => source, "err" => err);
            err
        })?;

        let declared = body.content_length;
        let script = read_script(body, self.limits.max_script_size).map_err(|err| {
            match &err {
                PacError::TooLarge { max } => log_error!(
                    self.log,
                    "PAC script too large",
                    "source" => source,
                    "content_length" => declared.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
                    "max_size" => max,
                ),
                _ => log_error!(self.log, "failed to read PAC script", "source" => source, "err" => err),
            }
            err
        })?;

        self.compile(script)
    }

    /// Loads script text that was obtained elsewhere. The size limit still
    /// applies.
    pub fn load_script(&self, script: impl Into<String>) -> Result<PacProxy> {
        let script = script.into();
        if let Some(max) = self.limits.max_script_size {
            if script.len() as u64 > max {
                log_error!(
                    self.log,
                    "PAC script too large",
                    "content_length" => script.len(),
                    "max_size" => max,
                );
                return Err(PacError::TooLarge { max });
            }
        }
        self.compile(script)
    }

    fn compile(&self, script: String) -> Result<PacProxy> {
        let resolver = self.resolver.clone().unwrap_or_else(|| -> Arc<dyn Resolve> {
            Arc::new(SystemResolver::new(self.limits.dns_lookup_timeout))
        });
        let env = HelperEnv::new(resolver, self.clock.clone());

        let host = QuickJsHost::new(env).map_err(|err| {
            log_error!(self.log, "failed to bind PAC functions", "err" => err);
            PacError::Execute(err.to_string())
        })?;

        let evaluator = Evaluator::new(host, self.limits.script_timeout);
        if let Err(err) = evaluator.run_top_level(&script) {
            log_error!(self.log, "failed to execute PAC script", "err" => err);
            return Err(err);
        }

        log_info!(self.log, "PAC script loaded", "bytes" => script.len());
        Ok(PacProxy {
            script,
            evaluator,
            log: self.log.clone(),
        })
    }
}

/// A loaded PAC script, ready to answer proxy queries.
///
/// Safe to share between threads; calls into the script are serialized.
pub struct PacProxy {
    script: String,
    evaluator: Evaluator<QuickJsHost>,
    log: LogSink,
}

impl PacProxy {
    /// Loads `script` with `config` and the default collaborators.
    pub fn from_script(script: impl Into<String>, config: &PacConfig) -> Result<Self> {
        Loader::new(config).load_script(script)
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Returns the raw `FindProxyForURL` result for `url`.
    pub fn find_proxy_string(&self, url: &Url) -> Result<String> {
        let host = host_of(url);
        log_debug!(self.log, "evaluating PAC script", "url" => url, "host" => host);

        match self.evaluator.evaluate(url.as_str(), &host) {
            Ok(raw) => {
                log_debug!(self.log, "PAC evaluation result", "url" => url, "proxy" => raw);
                Ok(raw)
            }
            Err(err @ PacError::Convert(_)) => {
                log_error!(self.log, "PAC script returned a non-string result", "url" => url, "err" => err);
                Err(err)
            }
            Err(err) => {
                log_error!(self.log, "PAC evaluation failed", "url" => url, "err" => err);
                Err(err)
            }
        }
    }

    /// Returns the proxy to use for `url`, or `None` for a direct connection.
    pub fn find_proxy(&self, url: &Url) -> Result<Option<ProxyEndpoint>> {
        let raw = self.find_proxy_string(url)?;
        directive::parse(&raw)
    }

    pub fn find_proxy_for_str(&self, url: &str) -> Result<Option<ProxyEndpoint>> {
        let parsed = Url::parse(url).map_err(|source| PacError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        self.find_proxy(&parsed)
    }

    /// A transport proxy function: the proxy URL for a request, `None` for a
    /// direct connection, or the error that kept the script from answering.
    pub fn proxy_func(
        self: Arc<Self>,
    ) -> impl Fn(&Url) -> Result<Option<Url>> + Send + Sync + 'static {
        move |url| Ok(self.find_proxy(url)?.map(|endpoint| endpoint.url().clone()))
    }

    /// A `reqwest` proxy that asks the script for every request.
    ///
    /// `reqwest` cannot fail a request from inside a proxy matcher, so
    /// `on_failure` decides where requests go when the script cannot answer.
    pub fn reqwest_proxy(self: Arc<Self>, on_failure: FailurePolicy) -> reqwest::Proxy {
        let log = self.log.clone();
        let lookup = self.proxy_func();
        reqwest::Proxy::custom(move |url| match lookup(url) {
            Ok(proxy) => proxy,
            Err(err) => {
                log_warn!(log, "PAC lookup failed, applying failure policy",
                    "url" => url, "err" => err, "policy" => on_failure);
                on_failure.proxy()
            }
        })
    }
}

/// Where `reqwest` requests go when the PAC script fails to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Connect without a proxy.
    Direct,
    /// Use this proxy instead.
    Proxy(Url),
}

impl FailurePolicy {
    fn proxy(&self) -> Option<Url> {
        match self {
            FailurePolicy::Direct => None,
            FailurePolicy::Proxy(url) => Some(url.clone()),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Direct => f.write_str("DIRECT"),
            FailurePolicy::Proxy(url) => write!(f, "{url}"),
        }
    }
}

/// The `host` argument of `FindProxyForURL`: no port, no IPv6 brackets.
fn host_of(url: &Url) -> String {
    match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::tests::CaptureLogger;
    use crate::log::{redact_keys_hook, LogLevel};
    use crate::pac::downloader::ScriptBody;
    use std::io::Cursor;

    struct MemoryFetcher(&'static str);

    impl ScriptFetcher for MemoryFetcher {
        fn fetch(&self, source: &str) -> Result<ScriptBody> {
            if source.contains("missing") {
                return Err(PacError::Fetch("HTTP 404 Not Found".into()));
            }
            Ok(ScriptBody::new(None, Cursor::new(self.0.as_bytes().to_vec())))
        }
    }

    const SCRIPT: &str = "function FindProxyForURL(url, host) { return 'PROXY ' + host + ':3128'; }";

    #[test]
    fn host_argument_has_no_port_or_brackets() {
        let url = Url::parse("http://example.com:8080/a").unwrap();
        assert_eq!(host_of(&url), "example.com");
        let url = Url::parse("http://[::1]:8080/").unwrap();
        assert_eq!(host_of(&url), "::1");
        let url = Url::parse("data:text/plain,hi").unwrap();
        assert_eq!(host_of(&url), "");
    }

    #[test]
    fn proxy_func_returns_errors_to_the_caller() {
        let proxy = Arc::new(
            Loader::new(&PacConfig::default())
                .with_log_sink(LogSink::disabled())
                .load_script(
                    "function FindProxyForURL(url, host) {
                        if (host == 'direct.example') return 'DIRECT';
                        if (host == 'bogus.example') return 'BOGUS';
                        if (host == 'throws.example') throw new Error('boom');
                        return 'SOCKS s:1080';
                    }",
                )
                .unwrap(),
        );
        let lookup = proxy.proxy_func();

        let url = |s: &str| Url::parse(s).unwrap();
        assert_eq!(lookup(&url("http://direct.example/")).unwrap(), None);
        assert_eq!(
            lookup(&url("http://other.example/")).unwrap(),
            Some(url("socks5://s:1080"))
        );
        assert!(matches!(
            lookup(&url("http://bogus.example/")),
            Err(PacError::NoValidProxy(_))
        ));
        assert!(matches!(
            lookup(&url("http://throws.example/")),
            Err(PacError::Evaluate(_))
        ));
    }

    #[test]
    fn failure_policy_picks_the_fallback() {
        assert_eq!(FailurePolicy::Direct.proxy(), None);
        let fallback = Url::parse("http://fallback.corp:3128").unwrap();
        let policy = FailurePolicy::Proxy(fallback.clone());
        assert_eq!(policy.proxy(), Some(fallback));
        assert_eq!(policy.to_string(), "http://fallback.corp:3128/");
        assert_eq!(FailurePolicy::Direct.to_string(), "DIRECT");
    }

    #[test]
    fn lifecycle_is_logged_through_the_hook() {
        let capture = Arc::new(CaptureLogger::default());
        let sink = LogSink::new(capture.clone()).with_hook(redact_keys_hook(["source"]));
        let loader = Loader::new(&PacConfig::default())
            .with_fetcher(Arc::new(MemoryFetcher(SCRIPT)))
            .with_log_sink(sink);

        let proxy = loader.load("http://secret@wpad/proxy.pac").unwrap();
        assert_eq!(proxy.script(), SCRIPT);
        let endpoint = proxy.find_proxy_for_str("https://example.com/x").unwrap();
        assert_eq!(endpoint.unwrap().to_string(), "http://example.com:3128");

        let records = capture.records.lock().unwrap();
        let messages: Vec<&str> = records.iter().map(|(_, msg, _)| msg.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "fetching PAC script",
                "PAC script loaded",
                "evaluating PAC script",
                "PAC evaluation result",
            ]
        );
        assert_eq!(records[0].2, vec![("source".to_string(), "[REDACTED]".to_string())]);
        assert_eq!(records[1].2, vec![("bytes".to_string(), SCRIPT.len().to_string())]);
        assert_eq!(records[3].0, LogLevel::Debug);
    }

    #[test]
    fn fetch_failures_are_logged_and_returned() {
        let capture = Arc::new(CaptureLogger::default());
        let loader = Loader::new(&PacConfig::default())
            .with_fetcher(Arc::new(MemoryFetcher(SCRIPT)))
            .with_log_sink(LogSink::new(capture.clone()));

        assert!(matches!(
            loader.load("http://wpad/missing.pac"),
            Err(PacError::Fetch(_))
        ));
        let records = capture.records.lock().unwrap();
        let (level, msg, _) = records.last().unwrap();
        assert_eq!(*level, LogLevel::Error);
        assert_eq!(msg, "failed to fetch PAC script");
    }

    #[test]
    fn too_large_reports_sizes() {
        let capture = Arc::new(CaptureLogger::default());
        let config = PacConfig {
            max_script_size: 10,
            ..PacConfig::default()
        };
        let loader = Loader::new(&config)
            .with_fetcher(Arc::new(MemoryFetcher(SCRIPT)))
            .with_log_sink(LogSink::new(capture.clone()));

        assert!(matches!(
            loader.load("http://wpad/proxy.pac"),
            Err(PacError::TooLarge { max: 10 })
        ));
        let records = capture.records.lock().unwrap();
        let (_, msg, fields) = records.last().unwrap();
        assert_eq!(msg, "PAC script too large");
        assert!(fields.contains(&("content_length".to_string(), "unknown".to_string())));
        assert!(fields.contains(&("max_size".to_string(), "10".to_string())));
    }
}
