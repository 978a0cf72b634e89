//! Message broker abstraction
//!
//! Consumers talk to the broker only through the session traits below, so the
//! in-process [`MemoryBroker`] and a networked client are interchangeable.
//! Payloads are opaque bytes; the crawl layer encodes [`crate::CrawlEvent`]s
//! into them.

mod memory;

pub use memory::MemoryBroker;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by broker sessions
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Broker session closed")]
    Closed,
}

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Entry point for opening broker sessions
#[async_trait]
pub trait Broker: Send + Sync {
    /// Opens a producer session
    async fn connect_producer(&self) -> BrokerResult<Arc<dyn ProducerSession>>;

    /// Opens a consumer session that commits offsets under `group_id`
    async fn connect_consumer(&self, group_id: &str) -> BrokerResult<Box<dyn ConsumerSession>>;
}

/// Publishes payloads onto topics
#[async_trait]
pub trait ProducerSession: Send + Sync {
    async fn send(&self, topic: &str, payload: Bytes) -> BrokerResult<()>;

    /// Releases the session; later sends fail with [`BrokerError::Closed`]
    async fn close(&self);
}

/// A group-scoped subscription handle
#[async_trait]
pub trait ConsumerSession: Send + Sync {
    /// Subscribes to `topic` with `count` streams sharing the group's offset
    async fn create_streams(
        &self,
        topic: &str,
        count: usize,
    ) -> BrokerResult<Vec<Box<dyn MessageStream>>>;

    /// Releases the session and ends every stream it created
    async fn shutdown(&self);
}

/// An ordered stream of payloads from one topic
#[async_trait]
pub trait MessageStream: Send {
    /// Waits for the next payload
    ///
    /// Returns `None` once the owning session has been shut down.
    async fn next_message(&mut self) -> Option<Bytes>;
}
