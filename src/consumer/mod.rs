//! Topic consumers
//!
//! A [`CrawlConsumer`] owns one subscription to one topic and feeds every
//! message through the crawl policy, publishing follow-up events back onto
//! the same topic. The [`ConsumerManager`] is the process-wide registry the
//! cluster layer starts and stops consumers through.

mod crawl_consumer;
mod manager;

pub use crawl_consumer::CrawlConsumer;
pub use manager::ConsumerManager;

/// Streams opened per topic subscription
pub const STREAMS_PER_TOPIC: usize = 1;
