//! Storage traits and error types
//!
//! This module defines the capability interface for crawl storage backends
//! and associated error types.

use thiserror::Error;
use url::Url;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Capability interface for crawl storage backends
///
/// Implementations are shared across consumer workers of every topic and
/// must tolerate concurrent calls. Writes are idempotent: re-processing a URL
/// never duplicates a record or an edge.
pub trait CrawlStore: Send + Sync {
    /// Returns true if the URL carries an error marker
    fn has_error(&self, url: &Url) -> StorageResult<bool>;

    /// Returns true if the URL has neither been fetched nor marked errored
    fn should_explore(&self, url: &Url) -> StorageResult<bool>;

    /// Stores a fetched payload
    ///
    /// # Returns
    ///
    /// `true` if this call recorded the URL for the first time, `false` if
    /// the payload was already present
    fn handle_data(&self, url: &Url, data: &[u8]) -> StorageResult<bool>;

    /// Records a non-success HTTP status against the URL
    fn mark_error(&self, url: &Url, code: u16) -> StorageResult<()>;

    /// Records a cross-domain link between two hosts
    ///
    /// # Returns
    ///
    /// `true` if the edge was new
    fn record_external_edge(&self, src_host: &str, dst_host: &str) -> StorageResult<bool>;
}
