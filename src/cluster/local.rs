//! In-process coordination service
//!
//! Holds resource configs and one partition per resource, and drives the
//! partitions of its single participant through the state table when
//! resources are assigned or unassigned.

use crate::cluster::connection::CoordinationService;
use crate::cluster::handler::{
    ResourceConfigSource, StateModelFactory, TransitionContext, TransitionHandler,
};
use crate::cluster::state_model::{PartitionState, StateMachineDriver, StateModelDefinition};
use crate::cluster::{partition_name, ClusterError, ClusterResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Resource configs, kept apart from the partition lock so handlers can read
/// them mid-transition
#[derive(Default)]
struct ConfigStore {
    resources: RwLock<HashMap<String, HashMap<String, String>>>,
}

#[async_trait]
impl ResourceConfigSource for ConfigStore {
    async fn resource_config(
        &self,
        _cluster: &str,
        resource: &str,
        keys: &[&str],
    ) -> ClusterResult<HashMap<String, String>> {
        let resources = self.resources.read().unwrap_or_else(|e| e.into_inner());
        let config = resources
            .get(resource)
            .ok_or_else(|| ClusterError::UnknownResource(resource.to_string()))?;

        Ok(keys
            .iter()
            .filter_map(|key| config.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }
}

struct Partition {
    resource: String,
    driver: StateMachineDriver,
    handler: Arc<dyn TransitionHandler>,
}

struct Participant {
    cluster: String,
    name: String,
    model: &'static StateModelDefinition,
    factory: Arc<dyn StateModelFactory>,
}

#[derive(Default)]
struct Registry {
    connected: bool,
    participant: Option<Participant>,
    partitions: HashMap<String, Partition>,
}

/// Single-node coordination service
#[derive(Default)]
pub struct LocalCoordinator {
    registry: Mutex<Registry>,
    configs: Arc<ConfigStore>,
}

impl LocalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource with its configuration, replacing any previous one
    pub fn add_resource(&self, resource: &str, config: HashMap<String, String>) {
        self.configs
            .resources
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(resource.to_string(), config);
    }

    /// Brings a resource's partition ONLINE on this participant
    pub async fn assign(&self, resource: &str) -> ClusterResult<()> {
        self.transition(resource, PartitionState::Online).await
    }

    /// Takes a resource's partition OFFLINE
    pub async fn unassign(&self, resource: &str) -> ClusterResult<()> {
        self.transition(resource, PartitionState::Offline).await
    }

    /// Recovers a partition from ERROR to OFFLINE
    pub async fn reset(&self, resource: &str) -> ClusterResult<()> {
        self.transition(resource, PartitionState::Offline).await
    }

    /// Current state of a resource's partition, if it was ever assigned
    pub async fn partition_state(&self, resource: &str) -> Option<PartitionState> {
        self.registry
            .lock()
            .await
            .partitions
            .get(&partition_name(resource))
            .map(|p| p.driver.state())
    }

    async fn transition(&self, resource: &str, to: PartitionState) -> ClusterResult<()> {
        if !self.has_resource(resource) {
            return Err(ClusterError::UnknownResource(resource.to_string()));
        }

        let mut registry = self.registry.lock().await;
        if !registry.connected {
            return Err(ClusterError::NotConnected);
        }
        let Some(participant) = registry.participant.as_ref() else {
            return Err(ClusterError::UnknownParticipant(String::new()));
        };

        let partition = partition_name(resource);
        let context = TransitionContext {
            cluster_name: participant.cluster.clone(),
            configs: self.configs.clone(),
        };
        let model = participant.model;
        let factory = participant.factory.clone();

        let entry = registry
            .partitions
            .entry(partition.clone())
            .or_insert_with(|| Partition {
                resource: resource.to_string(),
                driver: StateMachineDriver::new(model),
                handler: factory.create_handler(resource, &partition),
            });

        entry
            .driver
            .transition_to(to, entry.handler.as_ref(), resource, &partition, &context)
            .await
    }

    fn has_resource(&self, resource: &str) -> bool {
        self.configs
            .resources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(resource)
    }
}

#[async_trait]
impl CoordinationService for LocalCoordinator {
    async fn connect(&self, connect_string: &str) -> ClusterResult<()> {
        self.registry.lock().await.connected = true;
        tracing::info!("Connected to local coordinator ({})", connect_string);
        Ok(())
    }

    async fn disconnect(&self) {
        let mut registry = self.registry.lock().await;
        registry.connected = false;
        registry.participant = None;
    }

    async fn start_participant(
        &self,
        cluster: &str,
        participant: &str,
        model: &'static StateModelDefinition,
        factory: Arc<dyn StateModelFactory>,
    ) -> ClusterResult<()> {
        let mut registry = self.registry.lock().await;
        if !registry.connected {
            return Err(ClusterError::NotConnected);
        }

        registry.participant = Some(Participant {
            cluster: cluster.to_string(),
            name: participant.to_string(),
            model,
            factory,
        });
        Ok(())
    }

    async fn stop_participant(&self, cluster: &str, participant: &str) -> ClusterResult<()> {
        let mut registry = self.registry.lock().await;

        let registered = registry
            .participant
            .as_ref()
            .is_some_and(|p| p.cluster == cluster && p.name == participant);
        if !registered {
            return Err(ClusterError::UnknownParticipant(participant.to_string()));
        }

        let context = TransitionContext {
            cluster_name: cluster.to_string(),
            configs: self.configs.clone(),
        };
        for (name, partition) in registry.partitions.iter_mut() {
            if partition.driver.state() != PartitionState::Online {
                continue;
            }
            if let Err(e) = partition
                .driver
                .transition_to(
                    PartitionState::Offline,
                    partition.handler.as_ref(),
                    &partition.resource,
                    name,
                    &context,
                )
                .await
            {
                tracing::warn!("Could not take {} offline: {}", name, e);
            }
        }

        registry.partitions.clear();
        registry.participant = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::state_model::{TransitionAction, ONLINE_OFFLINE};
    use crate::cluster::TransitionMessage;
    use crate::{PantopodError, Result};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Records every transition and fails starts while `fail_starts` is set
    #[derive(Default)]
    struct Recorder {
        log: StdMutex<Vec<(String, TransitionAction, Option<String>)>>,
        fail_starts: AtomicBool,
    }

    #[async_trait]
    impl TransitionHandler for Recorder {
        async fn on_transition(
            &self,
            action: TransitionAction,
            message: &TransitionMessage,
            context: &TransitionContext,
        ) -> Result<()> {
            let chroot = context
                .configs
                .resource_config(&context.cluster_name, &message.resource_name, &["chroot"])
                .await?
                .remove("chroot");
            self.log
                .lock()
                .unwrap()
                .push((message.partition_name.clone(), action, chroot));

            if action == TransitionAction::StartConsumer && self.fail_starts.load(Ordering::SeqCst) {
                return Err(PantopodError::Process("start failed".to_string()));
            }
            Ok(())
        }
    }

    struct RecorderFactory(Arc<Recorder>);

    impl StateModelFactory for RecorderFactory {
        fn create_handler(&self, _resource: &str, _partition: &str) -> Arc<dyn TransitionHandler> {
            self.0.clone()
        }
    }

    async fn joined() -> (LocalCoordinator, Arc<Recorder>) {
        let coordinator = LocalCoordinator::new();
        let recorder = Arc::new(Recorder::default());
        coordinator.connect("local").await.unwrap();
        coordinator
            .start_participant(
                "pantopod",
                "p1",
                &ONLINE_OFFLINE,
                Arc::new(RecorderFactory(recorder.clone())),
            )
            .await
            .unwrap();
        coordinator.add_resource(
            "a.com",
            HashMap::from([("chroot".to_string(), "/docs/".to_string())]),
        );
        (coordinator, recorder)
    }

    #[tokio::test]
    async fn test_assign_and_unassign() {
        let (coordinator, recorder) = joined().await;

        coordinator.assign("a.com").await.unwrap();
        assert_eq!(
            coordinator.partition_state("a.com").await,
            Some(PartitionState::Online)
        );
        coordinator.unassign("a.com").await.unwrap();
        assert_eq!(
            coordinator.partition_state("a.com").await,
            Some(PartitionState::Offline)
        );

        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                (
                    "a.com_0".to_string(),
                    TransitionAction::StartConsumer,
                    Some("/docs/".to_string())
                ),
                (
                    "a.com_0".to_string(),
                    TransitionAction::StopConsumer,
                    Some("/docs/".to_string())
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_start_enters_error_and_resets() {
        let (coordinator, recorder) = joined().await;
        recorder.fail_starts.store(true, Ordering::SeqCst);

        assert!(coordinator.assign("a.com").await.is_err());
        assert_eq!(
            coordinator.partition_state("a.com").await,
            Some(PartitionState::Error)
        );

        coordinator.reset("a.com").await.unwrap();
        recorder.fail_starts.store(false, Ordering::SeqCst);
        coordinator.assign("a.com").await.unwrap();
        assert_eq!(
            coordinator.partition_state("a.com").await,
            Some(PartitionState::Online)
        );
    }

    #[tokio::test]
    async fn test_unknown_resource_rejected() {
        let (coordinator, _recorder) = joined().await;
        assert!(matches!(
            coordinator.assign("b.com").await,
            Err(ClusterError::UnknownResource(_))
        ));
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let coordinator = LocalCoordinator::new();
        coordinator.add_resource("a.com", HashMap::new());

        assert!(matches!(
            coordinator.assign("a.com").await,
            Err(ClusterError::NotConnected)
        ));
        assert!(matches!(
            coordinator
                .start_participant(
                    "c",
                    "p",
                    &ONLINE_OFFLINE,
                    Arc::new(RecorderFactory(Arc::new(Recorder::default())))
                )
                .await,
            Err(ClusterError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_stop_participant_takes_partitions_offline() {
        let (coordinator, recorder) = joined().await;
        coordinator.assign("a.com").await.unwrap();

        coordinator.stop_participant("pantopod", "p1").await.unwrap();

        let actions: Vec<TransitionAction> = recorder
            .log
            .lock()
            .unwrap()
            .iter()
            .map(|(_, action, _)| *action)
            .collect();
        assert_eq!(
            actions,
            vec![TransitionAction::StartConsumer, TransitionAction::StopConsumer]
        );
        assert_eq!(coordinator.partition_state("a.com").await, None);
        assert!(coordinator.stop_participant("pantopod", "p1").await.is_err());
    }
}
