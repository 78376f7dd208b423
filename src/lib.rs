//! Webmirror: a resumable website mirroring crawler
//!
//! This crate downloads a website (or a set of sites) into a local directory by
//! recursively following links, rewriting HTML so mirrored links resolve locally.
//! Traversal is bounded by per-task link budgets and the crawl can be resumed
//! from its on-disk log after the process stops.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for webmirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("File name generation overflow for {url} ({name}-N{ext})")]
    AllocationOverflow {
        url: String,
        name: String,
        ext: String,
    },

    #[error("Resume log error: {0}")]
    Persistence(String),

    #[error("Unsupported protocol: {url}")]
    UnsupportedProtocol { url: String },

    #[error("{path} must be a file")]
    NotAFile { path: String },

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MirrorError {
    /// Returns true if a failed fetch may be attempted again
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Reqwest(_) | Self::Io(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid root URL argument: {0}")]
    InvalidRoot(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for webmirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{MirrorConfig, RootUrl, SaveMode};
pub use crawler::{Crawl, Mirror};
pub use state::{Budget, Task};
pub use url::normalize_url;
