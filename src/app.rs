//! Process wiring
//!
//! Builds every component from the configuration and runs them in order:
//! Tor proxy, consumer manager, cluster connection. Shutdown goes in reverse.

use crate::broker::MemoryBroker;
use crate::cluster::{
    ClusterConnection, CrawlStateModelFactory, LocalCoordinator, CHROOT_KEY, ONLINE_OFFLINE,
    START_PAGE_KEY,
};
use crate::config::Config;
use crate::consumer::ConsumerManager;
use crate::crawler::{build_http_client, CrawlPolicy, HttpFetcher};
use crate::storage::open_store;
use crate::tor::TorProxyManager;
use crate::{PantopodError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;

/// A fully wired participant process
pub struct Application {
    config: Config,
    tor: Option<TorProxyManager>,
    broker: MemoryBroker,
    coordinator: Arc<LocalCoordinator>,
    manager: Arc<ConsumerManager>,
    connection: ClusterConnection,
}

impl Application {
    /// Builds the application; must be called from within a Tokio runtime
    pub fn build(config: Config) -> Result<Self> {
        let executor = Handle::try_current()
            .map_err(|e| PantopodError::Process(format!("no async runtime: {}", e)))?;

        let tor = config
            .tor
            .enabled
            .then(|| TorProxyManager::new(config.tor.clone()));
        let proxy = tor.as_ref().map(TorProxyManager::proxy_url);

        let client = build_http_client(&config.http_client, proxy.as_deref())?;
        let store = open_store(&config)?;
        let policy = Arc::new(CrawlPolicy::from_config(
            Arc::new(HttpFetcher::new(client)),
            store,
            &config.crawler,
        ));

        tracing::info!(
            "Using in-process broker (configured broker list: {})",
            config.broker.broker_list
        );
        let broker = MemoryBroker::new();
        let group_id = config.broker.resolved_group_id();
        let manager = Arc::new(ConsumerManager::new(
            Arc::new(broker.clone()),
            group_id,
            policy,
            executor,
        ));

        let coordinator = Arc::new(LocalCoordinator::new());
        for resource in &config.resources {
            let mut settings = HashMap::new();
            if let Some(chroot) = &resource.chroot {
                settings.insert(CHROOT_KEY.to_string(), chroot.clone());
            }
            if let Some(start_page) = &resource.start_page {
                settings.insert(START_PAGE_KEY.to_string(), start_page.clone());
            }
            coordinator.add_resource(&resource.name, settings);
        }

        let connection = ClusterConnection::new(
            coordinator.clone(),
            config.cluster.clone(),
            &ONLINE_OFFLINE,
            Arc::new(CrawlStateModelFactory::new(manager.clone())),
        );

        Ok(Self {
            config,
            tor,
            broker,
            coordinator,
            manager,
            connection,
        })
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    pub fn coordinator(&self) -> &Arc<LocalCoordinator> {
        &self.coordinator
    }

    pub fn manager(&self) -> &Arc<ConsumerManager> {
        &self.manager
    }

    /// Starts every component and assigns the configured resources
    ///
    /// A resource that fails to come online is logged and left in ERROR; the
    /// others still start.
    pub async fn start(&self) -> Result<()> {
        if let Some(tor) = &self.tor {
            tor.start().await?;
        }

        self.manager.start().await;

        if let Err(e) = self.connection.start().await {
            self.manager.stop().await;
            if let Some(tor) = &self.tor {
                tor.stop().await;
            }
            return Err(e);
        }

        for resource in &self.config.resources {
            match self.coordinator.assign(&resource.name).await {
                Ok(()) => tracing::info!("Resource {} is online", resource.name),
                Err(e) => tracing::error!("Could not bring {} online: {}", resource.name, e),
            }
        }
        Ok(())
    }

    /// Stops every component in reverse start order
    pub async fn stop(&self) {
        self.connection.stop().await;
        self.manager.stop().await;
        if let Some(tor) = &self.tor {
            tor.stop().await;
        }
    }

    /// Runs until Ctrl-C, then shuts down
    pub async fn run_until_shutdown(self) -> Result<()> {
        self.start().await?;

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");

        self.stop().await;
        Ok(())
    }
}
