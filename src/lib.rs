//! Transcript Service - an HTTP service for fetching YouTube transcripts
//!
//! This library wraps a remote transcript fetch in a retry policy with jittered
//! backoff and optional proxying, and exposes it over a small JSON API and CLI.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod proxy;
pub mod server;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{FetchError, FetchRequest, Transcript, TranscriptSegment, TranscriptSource};
pub use proxy::{resolve_proxy, ProxyConfig, ProxySource};
pub use transcribe::{FailureKind, FetchOutcome, ResilientFetcher};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the service
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Invalid video ID or URL: {0}")]
    InvalidVideoId(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
