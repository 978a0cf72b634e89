//! Filesystem storage implementation
//!
//! Layout under the output directory:
//!
//! ```text
//! <root>/<host>/<path segments...>/.dat   fetched payload
//! <root>/<host>/<path segments...>/.err   HTTP status of a failed fetch
//! <root>/<host>/.ext/<dst host>/          external edge marker
//! ```
//!
//! A path segment that spells a marker name, or starts with `%`, is stored
//! with one extra leading `%`, so `/x/.dat` lives in `x/%.dat/` and never
//! shadows the marker of `/x`.
//!
//! Existence checks and `create_new` opens stand in for transactions. Two
//! workers may both decide to fetch the same brand-new URL; only one of them
//! writes `.dat` and reports progress.

use crate::storage::traits::{CrawlStore, StorageResult};
use crate::url::extract_domain;
use crate::PantopodError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use url::Url;

const DAT_FILE: &str = ".dat";
const ERR_FILE: &str = ".err";
const EXT_DIR: &str = ".ext";
const ESCAPE: char = '%';

/// Directory-tree storage backend
pub struct FileCrawlStore {
    root: PathBuf,
}

impl FileCrawlStore {
    /// Creates a store rooted at `root`, creating the directory if needed
    pub fn new(root: &Path) -> Result<Self, PantopodError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the directory that holds the markers for a URL
    pub fn page_dir(&self, url: &Url) -> PathBuf {
        let mut dir = self.root.join(extract_domain(url).unwrap_or_default());
        for segment in url.path().split('/').filter(|s| !s.is_empty()) {
            dir.push(escape_segment(segment));
        }
        dir
    }

    /// Returns the directory that marks an edge from `src_host` to `dst_host`
    pub fn edge_dir(&self, src_host: &str, dst_host: &str) -> PathBuf {
        self.root.join(src_host).join(EXT_DIR).join(dst_host)
    }

    /// Creates `path` with `contents` unless it already exists
    ///
    /// Returns true if this call created the file.
    fn write_new(path: &Path, contents: &[u8]) -> StorageResult<bool> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(contents)?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn escape_segment(segment: &str) -> String {
    if matches!(segment, DAT_FILE | ERR_FILE | EXT_DIR) || segment.starts_with(ESCAPE) {
        format!("{}{}", ESCAPE, segment)
    } else {
        segment.to_string()
    }
}

impl CrawlStore for FileCrawlStore {
    fn has_error(&self, url: &Url) -> StorageResult<bool> {
        Ok(self.page_dir(url).join(ERR_FILE).exists())
    }

    fn should_explore(&self, url: &Url) -> StorageResult<bool> {
        let dir = self.page_dir(url);
        Ok(!dir.join(DAT_FILE).exists() && !dir.join(ERR_FILE).exists())
    }

    fn handle_data(&self, url: &Url, data: &[u8]) -> StorageResult<bool> {
        let dir = self.page_dir(url);
        fs::create_dir_all(&dir)?;

        let created = Self::write_new(&dir.join(DAT_FILE), data)?;
        if created {
            tracing::info!("Wrote {}", dir.display());
        }
        Ok(created)
    }

    fn mark_error(&self, url: &Url, code: u16) -> StorageResult<()> {
        let dir = self.page_dir(url);
        fs::create_dir_all(&dir)?;
        Self::write_new(&dir.join(ERR_FILE), code.to_string().as_bytes())?;
        Ok(())
    }

    fn record_external_edge(&self, src_host: &str, dst_host: &str) -> StorageResult<bool> {
        let dir = self.edge_dir(src_host, dst_host);
        if dir.exists() {
            return Ok(false);
        }
        fs::create_dir_all(&dir)?;
        Ok(true)
    }
}
