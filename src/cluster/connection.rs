use crate::cluster::handler::StateModelFactory;
use crate::cluster::state_model::StateModelDefinition;
use crate::cluster::ClusterResult;
use crate::config::ClusterConfig;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Participant-side view of the coordination service
#[async_trait]
pub trait CoordinationService: Send + Sync {
    async fn connect(&self, connect_string: &str) -> ClusterResult<()>;

    async fn disconnect(&self);

    /// Joins `cluster` as `participant`, registering the factory that builds
    /// a transition handler per assigned partition
    async fn start_participant(
        &self,
        cluster: &str,
        participant: &str,
        model: &'static StateModelDefinition,
        factory: Arc<dyn StateModelFactory>,
    ) -> ClusterResult<()>;

    /// Leaves the cluster, taking every owned partition offline first
    async fn stop_participant(&self, cluster: &str, participant: &str) -> ClusterResult<()>;
}

/// This process's session with the coordination service
pub struct ClusterConnection {
    service: Arc<dyn CoordinationService>,
    config: ClusterConfig,
    model: &'static StateModelDefinition,
    factory: Arc<dyn StateModelFactory>,
}

impl ClusterConnection {
    pub fn new(
        service: Arc<dyn CoordinationService>,
        config: ClusterConfig,
        model: &'static StateModelDefinition,
        factory: Arc<dyn StateModelFactory>,
    ) -> Self {
        Self {
            service,
            config,
            model,
            factory,
        }
    }

    /// Connects and registers this participant
    pub async fn start(&self) -> Result<()> {
        self.service.connect(&self.config.zk_connect_string).await?;

        if let Err(e) = self
            .service
            .start_participant(
                &self.config.cluster_name,
                &self.config.participant_name,
                self.model,
                self.factory.clone(),
            )
            .await
        {
            self.service.disconnect().await;
            return Err(e.into());
        }

        tracing::info!(
            "Participant {} joined cluster {} ({})",
            self.config.participant_name,
            self.config.cluster_name,
            self.model.name
        );
        Ok(())
    }

    /// Unregisters this participant and disconnects
    pub async fn stop(&self) {
        if let Err(e) = self
            .service
            .stop_participant(&self.config.cluster_name, &self.config.participant_name)
            .await
        {
            tracing::warn!("Could not stop participant {}: {}", self.config.participant_name, e);
        }
        self.service.disconnect().await;
        tracing::info!("Participant {} disconnected", self.config.participant_name);
    }
}
