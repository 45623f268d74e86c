// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use pacproxy::{Loader, PacConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ask a PAC script which proxy to use for each URL")]
struct Args {
    /// PAC script URL or path (defaults to the system setting)
    #[arg(long)]
    pac: Option<String>,

    /// JSON file with limits (max_script_size, script_timeout_ms, ...)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum script size in bytes (0 = default, negative = unlimited)
    #[arg(long, allow_hyphen_values = true)]
    max_script_size: Option<i64>,

    /// Script timeout in milliseconds (0 = default, negative = none)
    #[arg(long, allow_hyphen_values = true)]
    script_timeout_ms: Option<i64>,

    /// DNS lookup timeout in milliseconds (0 = default, negative = none)
    #[arg(long, allow_hyphen_values = true)]
    dns_timeout_ms: Option<i64>,

    /// Script download timeout in milliseconds (0 = default, negative = none)
    #[arg(long, allow_hyphen_values = true)]
    http_timeout_ms: Option<i64>,

    /// Print the raw FindProxyForURL result instead of the chosen proxy
    #[arg(long)]
    raw: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Target URLs
    #[arg(required = true)]
    urls: Vec<String>,
}

impl Args {
    fn pac_config(&self) -> Result<PacConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<PacConfig>(&text)
                    .with_context(|| format!("invalid config in {}", path.display()))?
            }
            None => PacConfig::default(),
        };
        if let Some(n) = self.max_script_size {
            config.max_script_size = n;
        }
        if let Some(n) = self.script_timeout_ms {
            config.script_timeout_ms = n;
        }
        if let Some(n) = self.dns_timeout_ms {
            config.dns_lookup_timeout_ms = n;
        }
        if let Some(n) = self.http_timeout_ms {
            config.http_timeout_ms = n;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.pac_config()?;
    let source = match &args.pac {
        Some(source) => source.clone(),
        None => pacproxy::system_proxy::pac_url().context("no PAC script configured")?,
    };

    let proxy = Loader::new(&config)
        .load(&source)
        .with_context(|| format!("failed to load PAC script from {source}"))?;

    for target in &args.urls {
        let url = Url::parse(target).with_context(|| format!("invalid URL {target}"))?;
        if args.raw {
            println!("{url} {}", proxy.find_proxy_string(&url)?);
            continue;
        }
        match proxy.find_proxy(&url)? {
            Some(endpoint) => println!("{url} {endpoint}"),
            None => println!("{url} DIRECT"),
        }
    }

    Ok(())
}
