// src/pac/mod.rs
pub mod datetime;
pub mod directive;
pub mod dns;
pub mod downloader;
pub mod engine;
pub mod evaluator;
pub mod helpers;
pub mod proxy;

pub use directive::{ProxyEndpoint, ProxyScheme};
pub use evaluator::ENTRY_POINT;
pub use proxy::{FailurePolicy, Loader, PacProxy};
