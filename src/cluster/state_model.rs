//! Ownership state model
//!
//! The model is a static transition table. [`StateMachineDriver`] looks up the
//! rule for a requested transition, runs its action through a
//! [`TransitionHandler`] and moves the partition to the target state, or to
//! `ERROR` when the action fails.

use crate::cluster::handler::{TransitionContext, TransitionHandler, TransitionMessage};
use crate::cluster::{ClusterError, ClusterResult};
use std::fmt;

/// States a resource partition can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionState {
    Offline,
    Online,
    Error,
}

impl PartitionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionState::Offline => "OFFLINE",
            PartitionState::Online => "ONLINE",
            PartitionState::Error => "ERROR",
        }
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a transition does on the participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    /// Read the resource config and start its consumer
    StartConsumer,
    /// Stop the resource's most recent consumer
    StopConsumer,
    /// Leave the error state without touching consumers
    Recover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: PartitionState,
    pub to: PartitionState,
    pub action: TransitionAction,
}

/// A named state model: initial state plus its transition table
#[derive(Debug)]
pub struct StateModelDefinition {
    pub name: &'static str,
    pub initial: PartitionState,
    pub rules: &'static [TransitionRule],
}

impl StateModelDefinition {
    /// Finds the rule for a transition, if the model allows it
    pub fn rule(&self, from: PartitionState, to: PartitionState) -> Option<&TransitionRule> {
        self.rules.iter().find(|r| r.from == from && r.to == to)
    }
}

pub static ONLINE_OFFLINE: StateModelDefinition = StateModelDefinition {
    name: "OnlineOffline",
    initial: PartitionState::Offline,
    rules: &[
        TransitionRule {
            from: PartitionState::Offline,
            to: PartitionState::Online,
            action: TransitionAction::StartConsumer,
        },
        TransitionRule {
            from: PartitionState::Online,
            to: PartitionState::Offline,
            action: TransitionAction::StopConsumer,
        },
        TransitionRule {
            from: PartitionState::Error,
            to: PartitionState::Offline,
            action: TransitionAction::Recover,
        },
    ],
};

/// Tracks one partition's state and applies transitions to it
pub struct StateMachineDriver {
    model: &'static StateModelDefinition,
    state: PartitionState,
}

impl StateMachineDriver {
    pub fn new(model: &'static StateModelDefinition) -> Self {
        Self {
            model,
            state: model.initial,
        }
    }

    pub fn state(&self) -> PartitionState {
        self.state
    }

    /// Moves the partition to `to`
    ///
    /// Requesting the current state is a no-op. A transition missing from the
    /// table fails without changing state; a failing action leaves the
    /// partition in `ERROR`.
    pub async fn transition_to(
        &mut self,
        to: PartitionState,
        handler: &dyn TransitionHandler,
        resource: &str,
        partition: &str,
        context: &TransitionContext,
    ) -> ClusterResult<()> {
        if self.state == to {
            return Ok(());
        }

        let rule = self
            .model
            .rule(self.state, to)
            .ok_or(ClusterError::InvalidTransition {
                from: self.state,
                to,
            })?;

        let message = TransitionMessage {
            resource_name: resource.to_string(),
            partition_name: partition.to_string(),
            from: self.state,
            to,
        };

        tracing::info!("{}: {} -> {}", partition, self.state, to);
        match handler.on_transition(rule.action, &message, context).await {
            Ok(()) => {
                self.state = to;
                Ok(())
            }
            Err(e) => {
                tracing::error!("{}: {} -> {} failed: {}", partition, message.from, to, e);
                self.state = PartitionState::Error;
                Err(ClusterError::TransitionFailed {
                    partition: partition.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
