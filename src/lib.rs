//! Novel-Trail: a sequential chapter downloader
//!
//! This crate walks a serialized novel page by page, following each chapter's
//! "next" link, and writes every chapter to a numbered file alongside a
//! metadata file and a cover image.

pub mod config;
pub mod crawler;
pub mod output;
pub mod site;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

pub use crawler::FetchError;
pub use output::{OutputError, ValidationError};
pub use site::ExtractionError;

/// Main error type for Novel-Trail operations
#[derive(Debug, Error)]
pub enum NovelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("No site adapter registered for domain '{domain}' ({url})")]
    UnsupportedSite { url: String, domain: String },

    #[error("Output location {} is already used by another run (lock file {})", .path.display(), crate::crawler::LOCK_FILE)]
    OutputBusy { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Crawl failed after index {}: {source}", describe_index(.last_index))]
    Crawl {
        last_index: Option<u32>,
        source: CrawlError,
    },
}

/// Errors that end a traversal in the `FAILED` state
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Navigation ended at {url} before chapter {start_index} was reached")]
    NavigationExhausted { url: String, start_index: u32 },

    #[error(transparent)]
    Output(OutputError),
}

impl From<OutputError> for CrawlError {
    fn from(error: OutputError) -> Self {
        match error {
            OutputError::Validation(v) => Self::Validation(v),
            other => Self::Output(other),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

fn describe_index(index: &Option<u32>) -> String {
    match index {
        Some(i) => i.to_string(),
        None => "none".to_string(),
    }
}

/// Result type alias for Novel-Trail operations
pub type Result<T> = std::result::Result<T, NovelError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, RunParams};
pub use crawler::{CrawlOrchestrator, Fetcher, HttpFetcher, TraversalEngine};
pub use output::{DirectorySink, OutputSink};
pub use site::{ChapterRecord, InfoRecord, SiteAdapter};
pub use state::{RunSummary, StopCause, StopIndex, TerminalReason};
