use crate::broker::Broker;
use crate::consumer::CrawlConsumer;
use crate::crawler::EventHandler;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Mutex;

/// Process-wide registry of running consumers, keyed by topic
///
/// Every registry change happens under one lock, and consumer start/stop I/O
/// runs while holding it, so concurrent transitions for different topics are
/// provisioned one at a time.
pub struct ConsumerManager {
    broker: Arc<dyn Broker>,
    group_id: String,
    handler: Arc<dyn EventHandler>,
    executor: Handle,
    consumers: Mutex<HashMap<String, Vec<Arc<CrawlConsumer>>>>,
}

impl ConsumerManager {
    pub fn new(
        broker: Arc<dyn Broker>,
        group_id: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        executor: Handle,
    ) -> Self {
        Self {
            broker,
            group_id: group_id.into(),
            handler,
            executor,
            consumers: Mutex::new(HashMap::new()),
        }
    }

    /// Starts the manager; consumers are created on demand
    pub async fn start(&self) {
        tracing::info!("Consumer manager started (group {})", self.group_id);
    }

    /// Stops every registered consumer across all topics
    pub async fn stop(&self) {
        let mut consumers = self.consumers.lock().await;
        for (topic, handles) in consumers.drain() {
            for consumer in handles.into_iter().rev() {
                tracing::info!("Stopping consumer for {}", topic);
                consumer.stop().await;
            }
        }
    }

    /// Starts a consumer for `topic` and registers it
    ///
    /// Nothing is registered if the consumer fails to start.
    pub async fn start_consumer(
        &self,
        topic: &str,
        chroot: Option<String>,
        start_page: Option<String>,
    ) -> Result<()> {
        let mut consumers = self.consumers.lock().await;

        let consumer = Arc::new(CrawlConsumer::new(
            topic,
            self.group_id.clone(),
            chroot,
            start_page,
            self.broker.clone(),
            self.handler.clone(),
            self.executor.clone(),
        ));
        consumer.start().await?;

        consumers.entry(topic.to_string()).or_default().push(consumer);
        Ok(())
    }

    /// Stops the most recently started consumer for `topic`
    ///
    /// Unknown or empty topics are ignored.
    pub async fn stop_consumer(&self, topic: &str) {
        let mut consumers = self.consumers.lock().await;

        let Some(handles) = consumers.get_mut(topic) else {
            tracing::debug!("No consumer registered for {}", topic);
            return;
        };
        let latest = handles.pop();
        if handles.is_empty() {
            consumers.remove(topic);
        }

        if let Some(consumer) = latest {
            consumer.stop().await;
        }
    }

    /// Number of consumers registered for `topic`
    pub async fn active_consumers(&self, topic: &str) -> usize {
        self.consumers
            .lock()
            .await
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Consumers registered for `topic`, oldest first
    pub async fn consumers(&self, topic: &str) -> Vec<Arc<CrawlConsumer>> {
        self.consumers
            .lock()
            .await
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Topics with at least one registered consumer
    pub async fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.consumers.lock().await.keys().cloned().collect();
        topics.sort();
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::event::CrawlEvent;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct IdleHandler;

    #[async_trait]
    impl EventHandler for IdleHandler {
        async fn handle(&self, _event: &CrawlEvent) -> Result<HashSet<CrawlEvent>> {
            Ok(HashSet::new())
        }
    }

    fn manager(broker: &MemoryBroker) -> ConsumerManager {
        ConsumerManager::new(
            Arc::new(broker.clone()),
            "group",
            Arc::new(IdleHandler),
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn test_start_and_stop_consumer() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);

        manager.start_consumer("a.com", None, None).await.unwrap();
        assert_eq!(manager.active_consumers("a.com").await, 1);
        assert_eq!(broker.messages("a.com").len(), 1);

        manager.stop_consumer("a.com").await;
        assert_eq!(manager.active_consumers("a.com").await, 0);
        assert!(manager.topics().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_unknown_topic_is_noop() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);

        manager.stop_consumer("nowhere.com").await;
        manager.start_consumer("a.com", None, None).await.unwrap();
        manager.stop_consumer("a.com").await;
        manager.stop_consumer("a.com").await;

        assert_eq!(manager.active_consumers("a.com").await, 0);
    }

    #[tokio::test]
    async fn test_failed_start_registers_nothing() {
        let broker = MemoryBroker::new();
        broker.set_available(false);
        let manager = manager(&broker);

        assert!(manager.start_consumer("a.com", None, None).await.is_err());
        assert_eq!(manager.active_consumers("a.com").await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_start_stops_latest_first() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);

        manager.start_consumer("a.com", None, None).await.unwrap();
        manager.start_consumer("a.com", None, None).await.unwrap();
        let handles = manager.consumers("a.com").await;
        assert_eq!(handles.len(), 2);
        assert!(handles.iter().all(|c| c.is_running()));

        manager.stop_consumer("a.com").await;
        assert!(handles[0].is_running());
        assert!(!handles[1].is_running());

        let remaining = manager.consumers("a.com").await;
        assert_eq!(remaining.len(), 1);
        assert!(Arc::ptr_eq(&remaining[0], &handles[0]));

        manager.stop_consumer("a.com").await;
        assert!(!handles[0].is_running());
    }

    #[tokio::test]
    async fn test_stop_drains_all_topics() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.start().await;

        manager.start_consumer("a.com", None, None).await.unwrap();
        manager.start_consumer("b.com", Some("/x/".to_string()), None).await.unwrap();
        assert_eq!(manager.topics().await, vec!["a.com", "b.com"]);

        manager.stop().await;
        assert!(manager.topics().await.is_empty());
    }
}
