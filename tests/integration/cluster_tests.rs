//! Integration tests for partition ownership

use async_trait::async_trait;
use pantopod::broker::MemoryBroker;
use pantopod::cluster::{
    ClusterConnection, CoordinationService, CrawlStateModelFactory, LocalCoordinator,
    PartitionState, CHROOT_KEY, ONLINE_OFFLINE,
};
use pantopod::config::ClusterConfig;
use pantopod::consumer::ConsumerManager;
use pantopod::crawler::EventHandler;
use pantopod::{CrawlEvent, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;

struct IdleHandler;

#[async_trait]
impl EventHandler for IdleHandler {
    async fn handle(&self, _event: &CrawlEvent) -> Result<HashSet<CrawlEvent>> {
        Ok(HashSet::new())
    }
}

struct Participant {
    broker: MemoryBroker,
    coordinator: Arc<LocalCoordinator>,
    manager: Arc<ConsumerManager>,
    connection: ClusterConnection,
}

async fn join_cluster() -> Participant {
    let broker = MemoryBroker::with_history();
    let manager = Arc::new(ConsumerManager::new(
        Arc::new(broker.clone()),
        "group",
        Arc::new(IdleHandler),
        Handle::current(),
    ));
    let coordinator = Arc::new(LocalCoordinator::new());
    coordinator.add_resource(
        "example.com",
        HashMap::from([(CHROOT_KEY.to_string(), "/start/".to_string())]),
    );

    let connection = ClusterConnection::new(
        coordinator.clone() as Arc<dyn CoordinationService>,
        ClusterConfig {
            zk_connect_string: "local".to_string(),
            cluster_name: "pantopod".to_string(),
            participant_name: "p1".to_string(),
        },
        &ONLINE_OFFLINE,
        Arc::new(CrawlStateModelFactory::new(manager.clone())),
    );
    connection.start().await.unwrap();

    Participant {
        broker,
        coordinator,
        manager,
        connection,
    }
}

#[tokio::test]
async fn test_online_offline_online_leaves_one_consumer() {
    let p = join_cluster().await;

    p.coordinator.assign("example.com").await.unwrap();
    p.coordinator.unassign("example.com").await.unwrap();
    p.coordinator.assign("example.com").await.unwrap();

    assert_eq!(p.manager.active_consumers("example.com").await, 1);
    assert_eq!(
        p.coordinator.partition_state("example.com").await,
        Some(PartitionState::Online)
    );

    // Each ONLINE transition seeds the topic
    let seeds: Vec<CrawlEvent> = p
        .broker
        .messages("example.com")
        .iter()
        .map(|b| CrawlEvent::from_bytes(b).unwrap())
        .collect();
    assert_eq!(seeds.len(), 2);
    assert!(seeds
        .iter()
        .all(|s| s.url.as_deref() == Some("http://example.com/start/")));

    p.connection.stop().await;
    assert_eq!(p.manager.active_consumers("example.com").await, 0);
}

#[tokio::test]
async fn test_broker_outage_puts_partition_in_error() {
    let p = join_cluster().await;
    p.broker.set_available(false);

    assert!(p.coordinator.assign("example.com").await.is_err());
    assert_eq!(
        p.coordinator.partition_state("example.com").await,
        Some(PartitionState::Error)
    );
    assert_eq!(p.manager.active_consumers("example.com").await, 0);

    p.broker.set_available(true);
    p.coordinator.reset("example.com").await.unwrap();
    p.coordinator.assign("example.com").await.unwrap();
    assert_eq!(p.manager.active_consumers("example.com").await, 1);

    p.connection.stop().await;
    p.manager.stop().await;
}
