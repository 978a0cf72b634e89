//! Transition handlers
//!
//! One handler exists per (resource, partition) assignment. It holds no state
//! of its own: every transition is forwarded to the shared
//! [`ConsumerManager`].

use crate::cluster::state_model::{PartitionState, TransitionAction};
use crate::cluster::ClusterResult;
use crate::consumer::ConsumerManager;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Resource config key holding the crawl's path prefix
pub const CHROOT_KEY: &str = "chroot";

/// Resource config key holding the seed page
pub const START_PAGE_KEY: &str = "startPage";

/// A transition delivered for one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionMessage {
    pub resource_name: String,
    pub partition_name: String,
    pub from: PartitionState,
    pub to: PartitionState,
}

/// What a handler can reach during a transition
pub struct TransitionContext {
    pub cluster_name: String,
    pub configs: Arc<dyn ResourceConfigSource>,
}

/// Read access to configuration attached to resources
#[async_trait]
pub trait ResourceConfigSource: Send + Sync {
    /// Returns the values present for `keys`; absent keys are left out
    async fn resource_config(
        &self,
        cluster: &str,
        resource: &str,
        keys: &[&str],
    ) -> ClusterResult<HashMap<String, String>>;
}

/// Runs the participant side of a state transition
#[async_trait]
pub trait TransitionHandler: Send + Sync {
    async fn on_transition(
        &self,
        action: TransitionAction,
        message: &TransitionMessage,
        context: &TransitionContext,
    ) -> Result<()>;
}

/// Creates a handler for each partition assigned to this participant
pub trait StateModelFactory: Send + Sync {
    fn create_handler(&self, resource: &str, partition: &str) -> Arc<dyn TransitionHandler>;
}

/// Starts and stops crawl consumers as partitions come and go
pub struct CrawlTransitionHandler {
    manager: Arc<ConsumerManager>,
}

impl CrawlTransitionHandler {
    pub fn new(manager: Arc<ConsumerManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl TransitionHandler for CrawlTransitionHandler {
    async fn on_transition(
        &self,
        action: TransitionAction,
        message: &TransitionMessage,
        context: &TransitionContext,
    ) -> Result<()> {
        let topic = &message.resource_name;

        match action {
            TransitionAction::StartConsumer => {
                let mut config = context
                    .configs
                    .resource_config(&context.cluster_name, topic, &[CHROOT_KEY, START_PAGE_KEY])
                    .await?;
                self.manager
                    .start_consumer(
                        topic,
                        config.remove(CHROOT_KEY),
                        config.remove(START_PAGE_KEY),
                    )
                    .await
            }
            TransitionAction::StopConsumer => {
                self.manager.stop_consumer(topic).await;
                Ok(())
            }
            TransitionAction::Recover => {
                tracing::info!("{} recovered from {}", message.partition_name, message.from);
                Ok(())
            }
        }
    }
}

/// Hands every partition a handler bound to the shared consumer manager
pub struct CrawlStateModelFactory {
    manager: Arc<ConsumerManager>,
}

impl CrawlStateModelFactory {
    pub fn new(manager: Arc<ConsumerManager>) -> Self {
        Self { manager }
    }
}

impl StateModelFactory for CrawlStateModelFactory {
    fn create_handler(&self, resource: &str, partition: &str) -> Arc<dyn TransitionHandler> {
        tracing::debug!("Creating transition handler for {} ({})", partition, resource);
        Arc::new(CrawlTransitionHandler::new(self.manager.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::cluster::ClusterError;
    use crate::crawler::EventHandler;
    use crate::event::CrawlEvent;
    use std::collections::HashSet;
    use tokio::runtime::Handle;

    struct IdleHandler;

    #[async_trait]
    impl EventHandler for IdleHandler {
        async fn handle(&self, _event: &CrawlEvent) -> Result<HashSet<CrawlEvent>> {
            Ok(HashSet::new())
        }
    }

    struct StaticConfigs(Option<HashMap<String, String>>);

    #[async_trait]
    impl ResourceConfigSource for StaticConfigs {
        async fn resource_config(
            &self,
            _cluster: &str,
            resource: &str,
            _keys: &[&str],
        ) -> ClusterResult<HashMap<String, String>> {
            self.0
                .clone()
                .ok_or_else(|| ClusterError::UnknownResource(resource.to_string()))
        }
    }

    fn setup(configs: StaticConfigs) -> (MemoryBroker, Arc<ConsumerManager>, TransitionContext) {
        let broker = MemoryBroker::new();
        let manager = Arc::new(ConsumerManager::new(
            Arc::new(broker.clone()),
            "group",
            Arc::new(IdleHandler),
            Handle::current(),
        ));
        let context = TransitionContext {
            cluster_name: "pantopod".to_string(),
            configs: Arc::new(configs),
        };
        (broker, manager, context)
    }

    fn message(from: PartitionState, to: PartitionState) -> TransitionMessage {
        TransitionMessage {
            resource_name: "example.com".to_string(),
            partition_name: "example.com_0".to_string(),
            from,
            to,
        }
    }

    #[tokio::test]
    async fn test_online_starts_consumer_with_resource_config() {
        let configs = HashMap::from([
            (CHROOT_KEY.to_string(), "/start/".to_string()),
            (START_PAGE_KEY.to_string(), "index.html".to_string()),
        ]);
        let (broker, manager, context) = setup(StaticConfigs(Some(configs)));
        let handler = CrawlStateModelFactory::new(manager.clone())
            .create_handler("example.com", "example.com_0");

        handler
            .on_transition(
                TransitionAction::StartConsumer,
                &message(PartitionState::Offline, PartitionState::Online),
                &context,
            )
            .await
            .unwrap();

        assert_eq!(manager.active_consumers("example.com").await, 1);
        let seed = CrawlEvent::from_bytes(&broker.messages("example.com")[0]).unwrap();
        assert_eq!(
            seed.url.as_deref(),
            Some("http://example.com/start/index.html")
        );

        handler
            .on_transition(
                TransitionAction::StopConsumer,
                &message(PartitionState::Online, PartitionState::Offline),
                &context,
            )
            .await
            .unwrap();
        assert_eq!(manager.active_consumers("example.com").await, 0);
        manager.stop().await;
    }

    #[tokio::test]
    async fn test_missing_config_fails_transition() {
        let (_broker, manager, context) = setup(StaticConfigs(None));
        let handler = CrawlTransitionHandler::new(manager.clone());

        let result = handler
            .on_transition(
                TransitionAction::StartConsumer,
                &message(PartitionState::Offline, PartitionState::Online),
                &context,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(manager.active_consumers("example.com").await, 0);
    }

    #[tokio::test]
    async fn test_recover_touches_nothing() {
        let (_broker, manager, context) = setup(StaticConfigs(None));
        let handler = CrawlTransitionHandler::new(manager.clone());

        handler
            .on_transition(
                TransitionAction::Recover,
                &message(PartitionState::Error, PartitionState::Offline),
                &context,
            )
            .await
            .unwrap();

        assert!(manager.topics().await.is_empty());
    }
}
