//! Storage module for persisting crawl effects
//!
//! This module holds the capability interface the crawl policy depends on and
//! its two interchangeable backends:
//! - SQLite: crawl records and external edges in two tables
//! - Filesystem: one directory per (host, path) with marker files

mod filesystem;
mod schema;
mod sqlite;
mod traits;

pub use filesystem::FileCrawlStore;
pub use sqlite::{init_database, SqliteCrawlStore};
pub use traits::{CrawlStore, StorageError, StorageResult};

use crate::config::{Config, HandlerType};
use crate::PantopodError;

use std::path::Path;
use std::sync::Arc;

/// Opens the storage backend selected by the configuration's handler type
///
/// # Returns
///
/// * `Ok(Arc<dyn CrawlStore>)` - The ready-to-use store
/// * `Err(PantopodError)` - Failed to initialize the backend
pub fn open_store(config: &Config) -> Result<Arc<dyn CrawlStore>, PantopodError> {
    match config.crawler.handler_type {
        HandlerType::Database => {
            let store = SqliteCrawlStore::new(Path::new(&config.output.database_path))?;
            Ok(Arc::new(store))
        }
        HandlerType::File => {
            let store = FileCrawlStore::new(Path::new(&config.output.output_dir))?;
            Ok(Arc::new(store))
        }
    }
}

/// Aggregate counts over a relational crawl store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of crawl records (fetched or errored URLs)
    pub records: u64,

    /// Number of records carrying an error code
    pub errors: u64,

    /// Number of distinct (source host, destination host) pairs
    pub external_edges: u64,
}
