//! Crawler module for fetching pages and deciding what to crawl next
//!
//! This module contains the crawl policy engine and its collaborators:
//! - HTTP fetching behind the `Fetcher` capability
//! - HTML link extraction
//! - The `EventHandler` trait the consumer loop drives
//! - `CrawlPolicy`, which turns one crawl event into its follow-up events

mod fetcher;
mod parser;
mod policy;

pub use fetcher::{build_http_client, FetchResponse, Fetcher, HttpFetcher};
pub use parser::extract_hrefs;
pub use policy::{CrawlPolicy, EventHandler};
