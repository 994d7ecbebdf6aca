//! Chitin: a crawl task queue and deduplicated content store
//!
//! This crate implements the durable core of a polite, resumable web crawler:
//! a task queue with atomic claiming and retry classification, a
//! reference-counted content store with exactly-once commit of fetch results,
//! a label index that survives entities that do not exist yet, and per-host
//! politeness bookkeeping.

pub mod config;
pub mod storage;
pub mod taxonomy;
pub mod url;

use thiserror::Error;

/// Main error type for Chitin operations
#[derive(Debug, Error)]
pub enum ChitinError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

/// Result type alias for Chitin operations
pub type Result<T> = std::result::Result<T, ChitinError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use storage::{FetchResult, NewTask, SqliteStore, Store, StoreError, TaskRecord};
pub use taxonomy::{ActionKind, FailureKind, StorageBackend};
pub use url::{extract_host, host_key, normalize_url, url_key};
