//! Crawl policy engine
//!
//! For every event the policy decides whether to fetch, records the outcome
//! in the storage backend, and derives follow-up events from the page's
//! same-authority links. Cross-authority links become external edges.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::extract_hrefs;
use crate::event::CrawlEvent;
use crate::storage::CrawlStore;
use crate::url::{extract_domain, is_same_authority, is_same_page, resolve_href};
use crate::{PantopodError, Result, UrlResult};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use url::Url;

/// Turns one crawl event into the set of events to publish next
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &CrawlEvent) -> Result<HashSet<CrawlEvent>>;
}

/// Links found on a page, split by authority
#[derive(Debug, Default)]
struct PageLinks {
    /// Same-authority links to other pages
    internal: BTreeSet<Url>,

    /// (source host, destination host) pairs for cross-authority links
    external: BTreeSet<(String, String)>,
}

/// Follows every same-authority link on a page
pub struct CrawlPolicy {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn CrawlStore>,
    check_errors: bool,
    traverse_duplicates: bool,
}

impl CrawlPolicy {
    /// Creates a policy that skips errored URLs and does not re-traverse
    /// already stored pages
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn CrawlStore>) -> Self {
        Self::with_options(fetcher, store, true, false)
    }

    pub fn with_options(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn CrawlStore>,
        check_errors: bool,
        traverse_duplicates: bool,
    ) -> Self {
        Self {
            fetcher,
            store,
            check_errors,
            traverse_duplicates,
        }
    }

    pub fn from_config(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn CrawlStore>,
        config: &CrawlerConfig,
    ) -> Self {
        Self::with_options(
            fetcher,
            store,
            config.check_errors,
            config.traverse_duplicates,
        )
    }

    /// Resolves and classifies every href on a page
    ///
    /// Fails on the first href containing `..`, before any link is recorded.
    fn classify_links(url: &Url, hrefs: &[String]) -> UrlResult<PageLinks> {
        let mut links = PageLinks::default();
        let src_host = extract_domain(url).unwrap_or_default();

        for href in hrefs {
            let Some(next) = resolve_href(url, href)? else {
                continue;
            };

            if !is_same_authority(url, &next) {
                let dst_host = extract_domain(&next).unwrap_or_default();
                links.external.insert((src_host.clone(), dst_host));
            } else if is_same_page(url, &next) {
                tracing::debug!("Skipping self link {}", next);
            } else {
                links.internal.insert(next);
            }
        }

        Ok(links)
    }

    /// Stores a fetched payload, treating storage failures as no progress
    fn record_data(&self, url: &Url, body: &[u8]) -> bool {
        match self.store.handle_data(url, body) {
            Ok(created) => created,
            Err(e) => {
                tracing::error!("Could not insert {}: {}", url, e);
                false
            }
        }
    }
}

#[async_trait]
impl EventHandler for CrawlPolicy {
    async fn handle(&self, event: &CrawlEvent) -> Result<HashSet<CrawlEvent>> {
        let mut next_events = HashSet::new();

        let url = Url::parse(event.url.as_deref().ok_or(PantopodError::MissingUrl)?)?;

        if self.check_errors && self.store.has_error(&url)? {
            tracing::debug!("Skipping previously errored {}", url);
            return Ok(next_events);
        }

        let response = self.fetcher.fetch(&url).await?;
        if !response.is_success() {
            tracing::error!("Error for {} #=> {}", url, response.status);
            if let Err(e) = self.store.mark_error(&url, response.status) {
                tracing::error!("Could not mark error {}: {}", url, e);
            }
            return Ok(next_events);
        }

        let created = self.record_data(&url, &response.body);
        let links = Self::classify_links(&url, &extract_hrefs(&response.body))?;

        for (src_host, dst_host) in &links.external {
            if let Err(e) = self.store.record_external_edge(src_host, dst_host) {
                tracing::warn!("Could not record edge {} #=> {}: {}", src_host, dst_host, e);
            }
        }

        if !(created || self.traverse_duplicates) {
            tracing::debug!("Already crawled {}, not following links", url);
            return Ok(next_events);
        }

        for link in links.internal {
            if self.store.should_explore(&link)? {
                tracing::debug!("Exploring {}", link);
                next_events.insert(event.child(link.as_str()));
            } else {
                tracing::debug!("Skipping {}", link);
            }
        }

        Ok(next_events)
    }
}
