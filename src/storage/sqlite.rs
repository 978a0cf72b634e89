//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CrawlStore trait.
//! Every operation opens its own connection, so concurrent workers rely on
//! SQLite's locking rather than on a shared handle.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CrawlStore, StorageResult};
use crate::storage::StoreStats;
use crate::PantopodError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
pub struct SqliteCrawlStore {
    path: PathBuf,
}

impl SqliteCrawlStore {
    /// Creates a new SqliteCrawlStore, creating the tables if needed
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCrawlStore)` - Successfully opened/created database
    /// * `Err(PantopodError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, PantopodError> {
        init_database(path).map_err(crate::storage::StorageError::from)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn open(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Returns the stored error code for a URL, if any
    pub fn error_code(&self, url: &Url) -> StorageResult<Option<u16>> {
        let conn = self.open()?;
        let code: Option<Option<u16>> = conn
            .query_row(
                "SELECT error FROM pantopod_crawler WHERE url = ?1",
                params![url.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(code.flatten())
    }

    /// Counts records, errored records and external edges
    pub fn stats(&self) -> StorageResult<StoreStats> {
        let conn = self.open()?;
        let count = |sql: &str| -> StorageResult<u64> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(StoreStats {
            records: count("SELECT COUNT(*) FROM pantopod_crawler")?,
            errors: count("SELECT COUNT(*) FROM pantopod_crawler WHERE error IS NOT NULL")?,
            external_edges: count("SELECT COUNT(*) FROM pantopod_ext")?,
        })
    }

    /// Lists every recorded external edge, ordered by source then destination
    pub fn external_edges(&self) -> StorageResult<Vec<(String, String)>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT src, dst FROM pantopod_ext ORDER BY src, dst")?;
        let edges = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }
}

impl CrawlStore for SqliteCrawlStore {
    fn has_error(&self, url: &Url) -> StorageResult<bool> {
        Ok(self.error_code(url)?.is_some())
    }

    fn should_explore(&self, url: &Url) -> StorageResult<bool> {
        let conn = self.open()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pantopod_crawler WHERE url = ?1",
            params![url.as_str()],
            |row| row.get(0),
        )?;
        Ok(count == 0)
    }

    fn handle_data(&self, url: &Url, data: &[u8]) -> StorageResult<bool> {
        let conn = self.open()?;

        // An errored row without data still counts as new progress
        let rows = conn.execute(
            "INSERT INTO pantopod_crawler (url, data) VALUES (?1, ?2)
             ON CONFLICT(url) DO UPDATE SET data = excluded.data
             WHERE pantopod_crawler.data IS NULL",
            params![url.as_str(), data],
        )?;

        if rows > 0 {
            tracing::info!("Inserted {}", url);
        }
        Ok(rows > 0)
    }

    fn mark_error(&self, url: &Url, code: u16) -> StorageResult<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO pantopod_crawler (url, error) VALUES (?1, ?2)
             ON CONFLICT(url) DO UPDATE SET error = excluded.error",
            params![url.as_str(), code],
        )?;
        Ok(())
    }

    fn record_external_edge(&self, src_host: &str, dst_host: &str) -> StorageResult<bool> {
        let conn = self.open()?;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO pantopod_ext (src, dst) VALUES (?1, ?2)",
            params![src_host, dst_host],
        )?;

        if rows > 0 {
            tracing::info!("Inserted {} #=> {}", src_host, dst_host);
        }
        Ok(rows > 0)
    }
}

/// Initializes a database connection with the proper settings
///
/// This is a helper function that sets up a connection with WAL mode
/// and creates the schema.
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (TempDir, SqliteCrawlStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteCrawlStore::new(&dir.path().join("crawl.db")).unwrap();
        (dir, store)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_new_url_should_be_explored() {
        let (_dir, store) = create_store();
        assert!(store.should_explore(&url("http://a.com/x")).unwrap());
        assert!(!store.has_error(&url("http://a.com/x")).unwrap());
    }

    #[test]
    fn test_handle_data_is_idempotent() {
        let (_dir, store) = create_store();
        let page = url("http://a.com/x");

        assert!(store.handle_data(&page, b"<html></html>").unwrap());
        assert!(!store.handle_data(&page, b"<html></html>").unwrap());

        assert_eq!(store.stats().unwrap().records, 1);
        assert!(!store.should_explore(&page).unwrap());
    }

    #[test]
    fn test_mark_error() {
        let (_dir, store) = create_store();
        let page = url("http://a.com/missing");

        store.mark_error(&page, 404).unwrap();

        assert!(store.has_error(&page).unwrap());
        assert!(!store.should_explore(&page).unwrap());
        assert_eq!(store.error_code(&page).unwrap(), Some(404));
    }

    #[test]
    fn test_mark_error_twice_keeps_one_record() {
        let (_dir, store) = create_store();
        let page = url("http://a.com/flaky");

        store.mark_error(&page, 500).unwrap();
        store.mark_error(&page, 503).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(store.error_code(&page).unwrap(), Some(503));
    }

    #[test]
    fn test_data_after_error_counts_as_progress() {
        let (_dir, store) = create_store();
        let page = url("http://a.com/recovered");

        store.mark_error(&page, 500).unwrap();
        assert!(store.handle_data(&page, b"ok").unwrap());
        assert!(!store.handle_data(&page, b"ok").unwrap());
    }

    #[test]
    fn test_external_edges_are_a_set() {
        let (_dir, store) = create_store();

        assert!(store.record_external_edge("a.com", "b.com").unwrap());
        assert!(!store.record_external_edge("a.com", "b.com").unwrap());
        assert!(store.record_external_edge("b.com", "a.com").unwrap());

        assert_eq!(
            store.external_edges().unwrap(),
            vec![
                ("a.com".to_string(), "b.com".to_string()),
                ("b.com".to_string(), "a.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crawl.db");
        let page = url("http://a.com/x");

        SqliteCrawlStore::new(&path)
            .unwrap()
            .handle_data(&page, b"data")
            .unwrap();

        let reopened = SqliteCrawlStore::new(&path).unwrap();
        assert!(!reopened.should_explore(&page).unwrap());
    }
}
