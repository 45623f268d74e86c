// src/error.rs
use thiserror::Error;

/// Everything that can go wrong while loading or evaluating a PAC script.
///
/// Each failure mode is its own variant so callers can tell a timeout apart
/// from a script that raised, or a fetch failure apart from an oversized body.
#[derive(Error, Debug)]
pub enum PacError {
    #[error("failed to fetch PAC script: {0}")]
    Fetch(String),

    #[error("PAC script exceeds maximum size of {max} bytes")]
    TooLarge { max: u64 },

    #[error("failed to read PAC script: {0}")]
    Read(#[source] std::io::Error),

    /// The script could not be compiled, a helper could not be bound, or the
    /// top-level code raised.
    #[error("failed to execute PAC script: {0}")]
    Execute(String),

    #[error("error evaluating PAC script: {0}")]
    Evaluate(String),

    #[error("PAC script returned {0} instead of a string")]
    Convert(String),

    #[error("PAC script execution timed out")]
    Timeout,

    #[error("no valid proxy found in {0:?}")]
    NoValidProxy(String),

    #[error("invalid proxy address {address:?}: {source}")]
    InvalidProxy {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid target URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("PAC URL not found")]
    PacUrlNotFound,

    #[error("PAC URL is empty")]
    PacUrlEmpty,

    #[error("system proxy lookup failed: {0}")]
    SystemLookup(String),
}

impl PacError {
    /// Whether the script ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PacError::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, PacError>;
