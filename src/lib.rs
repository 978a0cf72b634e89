//! Pantopod: a cluster-coordinated web crawler
//!
//! Crawl work travels as [`CrawlEvent`] messages on a broker topic per crawl
//! resource. A coordination service hands ownership of each resource to a
//! participant process, whose consumers turn every event into follow-up
//! events and publish them back onto the same topic.

pub mod app;
pub mod broker;
pub mod cluster;
pub mod config;
pub mod consumer;
pub mod crawler;
pub mod event;
pub mod storage;
pub mod tor;
pub mod url;

use thiserror::Error;

/// Main error type for Pantopod operations
#[derive(Debug, Error)]
pub enum PantopodError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Event codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Broker error: {0}")]
    Broker(#[from] broker::BrokerError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] cluster::ClusterError),

    #[error("Crawl event has no url")]
    MissingUrl,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process error: {0}")]
    Process(String),
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

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Relative URI not allowed: {0}")]
    ParentTraversal(String),
}

/// Result type alias for Pantopod operations
pub type Result<T> = std::result::Result<T, PantopodError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use event::CrawlEvent;
pub use crate::url::{authority, extract_domain, resolve_href};
