//! Crawl event schema
//!
//! A [`CrawlEvent`] is the only message exchanged over the broker. Events are
//! encoded as JSON with camelCase keys so that any producer speaking the same
//! schema can feed a topic.

use crate::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single unit of crawl work
///
/// Equality and hashing cover all four fields, so a set of follow-up events
/// collapses duplicate links found on the same page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlEvent {
    /// Absolute URL to crawl
    #[serde(default)]
    pub url: Option<String>,

    /// URL of the page this event was extracted from; absent for seeds
    #[serde(default)]
    pub parent_url: Option<String>,

    /// Hop count from the seed event
    #[serde(default)]
    pub depth: u32,

    /// Path prefix the crawl is scoped to
    #[serde(default)]
    pub chroot: Option<String>,
}

impl CrawlEvent {
    /// Builds the seed event that bootstraps a topic
    ///
    /// The URL is `"http://" + topic + chroot + start_page`, with missing parts
    /// treated as empty strings.
    ///
    /// # Example
    ///
    /// ```
    /// use pantopod::CrawlEvent;
    ///
    /// let seed = CrawlEvent::seed("example.com", Some("/start/"), Some("index.html"));
    /// assert_eq!(seed.url.as_deref(), Some("http://example.com/start/index.html"));
    /// assert_eq!(seed.depth, 0);
    /// ```
    pub fn seed(topic: &str, chroot: Option<&str>, start_page: Option<&str>) -> Self {
        let url = format!(
            "http://{}{}{}",
            topic,
            chroot.unwrap_or(""),
            start_page.unwrap_or("")
        );

        Self {
            url: Some(url),
            parent_url: None,
            depth: 0,
            chroot: chroot.map(str::to_string),
        }
    }

    /// Derives a follow-up event for a link found on this event's page
    ///
    /// Depth saturates at `u32::MAX`, so it never decreases along a chain.
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            parent_url: self.url.clone(),
            depth: self.depth.saturating_add(1),
            chroot: self.chroot.clone(),
        }
    }

    /// Encodes the event into its wire representation
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decodes an event from its wire representation
    pub fn from_bytes(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

impl fmt::Display for CrawlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CrawlEvent{{url={}, parentUrl={}, depth={}, chroot={}}}",
            self.url.as_deref().unwrap_or("null"),
            self.parent_url.as_deref().unwrap_or("null"),
            self.depth,
            self.chroot.as_deref().unwrap_or("null")
        )
    }
}
