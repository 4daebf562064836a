//! Interrupts issued against running or failed nodes.
//!
//! Every interrupt is applied as a guarded status update, exactly like a step
//! response. When it loses the guard it is dropped and nothing is recorded.

use crate::core::{InterruptType, Status, StatusSet};
use crate::errors::EngineError;
use crate::execution::{InterruptConfig, InterruptEffect, NodeExecution, NodeExecutionUpdate, UpdateOps};
use crate::services::NodeExecutionService;
use crate::strategy::NodeRunner;
use crate::utils::{generate_id, now_millis};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// A request to change the course of a node execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interrupt {
    /// Interrupt id.
    pub id: String,
    /// What to do.
    pub interrupt_type: InterruptType,
    /// Target node execution.
    pub node_execution_id: String,
    /// Who issued it.
    pub issued_by: String,
}

impl Interrupt {
    /// Creates an interrupt with a fresh id.
    #[must_use]
    pub fn new(
        interrupt_type: InterruptType,
        node_execution_id: impl Into<String>,
        issued_by: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            interrupt_type,
            node_execution_id: node_execution_id.into(),
            issued_by: issued_by.into(),
        }
    }

    fn effect(&self) -> InterruptEffect {
        InterruptEffect::new(
            self.id.clone(),
            self.interrupt_type,
            now_millis(),
            InterruptConfig::Issued {
                issued_by: self.issued_by.clone(),
            },
        )
    }
}

/// What an interrupt did.
#[derive(Debug, Clone, PartialEq)]
pub enum InterruptOutcome {
    /// The node moved to a new status.
    Applied(NodeExecution),
    /// A new attempt replaced the node.
    Retried {
        /// The attempt that was interrupted.
        old: NodeExecution,
        /// The new attempt.
        new: NodeExecution,
    },
    /// The node was not in a status the interrupt can act on.
    Dropped,
}

/// Applies interrupts through the node runner.
#[derive(Clone)]
pub struct InterruptManager {
    node_executions: Arc<dyn NodeExecutionService>,
    runner: Arc<dyn NodeRunner>,
}

impl InterruptManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(node_executions: Arc<dyn NodeExecutionService>, runner: Arc<dyn NodeRunner>) -> Self {
        Self {
            node_executions,
            runner,
        }
    }

    /// Applies `interrupt`.
    pub async fn handle(&self, interrupt: &Interrupt) -> Result<InterruptOutcome, EngineError> {
        info!(
            interrupt_id = %interrupt.id,
            interrupt_type = %interrupt.interrupt_type,
            node_execution_id = %interrupt.node_execution_id,
            "Handling interrupt"
        );
        let outcome = match interrupt.interrupt_type {
            InterruptType::Abort => self.abort(interrupt).await?,
            InterruptType::MarkSuccess => self.mark_success(interrupt).await?,
            InterruptType::Retry => self.retry(interrupt).await?,
        };
        if outcome == InterruptOutcome::Dropped {
            debug!(interrupt_id = %interrupt.id, "Interrupt dropped");
        }
        Ok(outcome)
    }

    async fn abort(&self, interrupt: &Interrupt) -> Result<InterruptOutcome, EngineError> {
        let ops = UpdateOps::new()
            .set(NodeExecutionUpdate::AppendInterrupt(interrupt.effect()))
            .set(NodeExecutionUpdate::EndTs(now_millis()));
        let aborted = self
            .node_executions
            .update_status_with_ops(
                &interrupt.node_execution_id,
                Status::Aborted,
                Some(ops),
                &Status::allowed_prior_for(Status::Aborted),
            )
            .await?;
        let Some(aborted) = aborted else {
            return Ok(InterruptOutcome::Dropped);
        };
        self.runner.end_node_execution(&aborted.ambiance).await?;
        Ok(InterruptOutcome::Applied(aborted))
    }

    async fn mark_success(&self, interrupt: &Interrupt) -> Result<InterruptOutcome, EngineError> {
        // Only settled nodes; a running step still owns its own completion.
        let allowed: StatusSet = Status::mark_success_prior();
        let ops = UpdateOps::new()
            .set(NodeExecutionUpdate::AppendInterrupt(interrupt.effect()))
            .set(NodeExecutionUpdate::FailureInfo(None))
            .set(NodeExecutionUpdate::EndTs(now_millis()));
        let updated = self
            .node_executions
            .update_status_with_ops(&interrupt.node_execution_id, Status::Succeeded, Some(ops), &allowed)
            .await?;
        let Some(updated) = updated else {
            return Ok(InterruptOutcome::Dropped);
        };
        self.runner.dispatch_advice(&updated, Status::Failed).await?;
        Ok(InterruptOutcome::Applied(updated))
    }

    async fn retry(&self, interrupt: &Interrupt) -> Result<InterruptOutcome, EngineError> {
        let ne = self.node_executions.get(&interrupt.node_execution_id).await?;
        if !(ne.status.is_broken() || ne.status == Status::InterventionWaiting) || ne.old_retry {
            return Ok(InterruptOutcome::Dropped);
        }
        match self.runner.retry_node_execution(&ne, Some(interrupt.id.clone())).await? {
            Some(new) => Ok(InterruptOutcome::Retried { old: ne, new }),
            None => Ok(InterruptOutcome::Dropped),
        }
    }
}

impl std::fmt::Debug for InterruptManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptManager").finish_non_exhaustive()
    }
}
