// src/pac/downloader.rs
use crate::error::{PacError, Result};
use reqwest::blocking::Client;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// A script body as handed over by a fetcher.
pub struct ScriptBody {
    /// Length announced by the source, if any. Not trusted on its own.
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

impl ScriptBody {
    pub fn new(content_length: Option<u64>, reader: impl Read + Send + 'static) -> Self {
        Self {
            content_length,
            reader: Box::new(reader),
        }
    }
}

/// Retrieves script bytes for a PAC source string.
pub trait ScriptFetcher: Send + Sync {
    fn fetch(&self, source: &str) -> Result<ScriptBody>;
}

/// Fetches `http`/`https` sources with a blocking `reqwest` client and opens
/// `file://` URLs and plain paths from disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PacError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

enum Location {
    Remote,
    Local(PathBuf),
}

fn locate(source: &str) -> Result<Location> {
    match Url::parse(source) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(Location::Remote),
            "file" => url
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| PacError::Fetch(format!("invalid file URL {source}"))),
            // Windows drive letters parse as one-letter schemes.
            scheme if scheme.len() == 1 => Ok(Location::Local(PathBuf::from(source))),
            scheme => Err(PacError::Fetch(format!("unsupported scheme {scheme:?}"))),
        },
        Err(_) => Ok(Location::Local(PathBuf::from(source))),
    }
}

impl ScriptFetcher for HttpFetcher {
    fn fetch(&self, source: &str) -> Result<ScriptBody> {
        if let Location::Local(path) = locate(source)? {
            let file = File::open(&path)
                .map_err(|e| PacError::Fetch(format!("{}: {e}", path.display())))?;
            let content_length = file.metadata().ok().map(|m| m.len());
            return Ok(ScriptBody::new(content_length, file));
        }

        let response = self
            .client
            .get(source)
            .send()
            .map_err(|e| PacError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PacError::Fetch(format!("HTTP {}", response.status())));
        }

        Ok(ScriptBody::new(response.content_length(), response))
    }
}

/// Reads a script body, rejecting anything over `max` bytes.
///
/// The declared length is checked first; the body itself is then read through
/// a `max + 1` byte window so a missing or understated length still trips the
/// limit without reading the rest. Invalid UTF-8 is replaced, not rejected.
pub fn read_script(body: ScriptBody, max: Option<u64>) -> Result<String> {
    let ScriptBody {
        content_length,
        mut reader,
    } = body;

    let mut bytes = Vec::new();
    match max {
        Some(max) => {
            if content_length.is_some_and(|len| len > max) {
                return Err(PacError::TooLarge { max });
            }
            reader
                .take(max.saturating_add(1))
                .read_to_end(&mut bytes)
                .map_err(PacError::Read)?;
            if bytes.len() as u64 > max {
                return Err(PacError::TooLarge { max });
            }
        }
        None => {
            reader.read_to_end(&mut bytes).map_err(PacError::Read)?;
        }
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
