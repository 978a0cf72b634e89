//! Cluster coordination
//!
//! The coordination service assigns each crawl resource to one participant
//! and drives its partition through the OFFLINE/ONLINE state model. This
//! module holds the state table, the transition handler that starts and stops
//! consumers, the participant connection, and [`LocalCoordinator`], an
//! in-process coordination service for single-node runs.

mod connection;
mod handler;
mod local;
mod state_model;

pub use connection::{ClusterConnection, CoordinationService};
pub use handler::{
    CrawlStateModelFactory, CrawlTransitionHandler, ResourceConfigSource, StateModelFactory,
    TransitionContext, TransitionHandler, TransitionMessage, CHROOT_KEY, START_PAGE_KEY,
};
pub use local::LocalCoordinator;
pub use state_model::{
    PartitionState, StateMachineDriver, StateModelDefinition, TransitionAction, TransitionRule,
    ONLINE_OFFLINE,
};

use thiserror::Error;

/// Errors raised by the coordination layer
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Not connected to the coordination service")]
    NotConnected,

    #[error("No transition from {from} to {to}")]
    InvalidTransition {
        from: PartitionState,
        to: PartitionState,
    },

    #[error("Transition failed for {partition}: {reason}")]
    TransitionFailed { partition: String, reason: String },

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),
}

/// Result type for coordination operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Name of the single partition every resource is split into
pub fn partition_name(resource: &str) -> String {
    format!("{}_0", resource)
}
