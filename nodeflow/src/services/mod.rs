//! Collaborator interfaces consumed by the engine.
//!
//! Every collaborator is an object-safe async trait held as `Arc<dyn _>`.
//! The [`crate::store`] module provides in-memory implementations; unit tests
//! additionally use `mockall` doubles generated from these definitions.

use crate::ambiance::Ambiance;
use crate::core::{Status, StatusSet};
use crate::errors::EngineError;
use crate::execution::{
    NodeExecution, NodeExecutionQuery, NodeField, ResponseData, ResponseMap, UpdateOps,
};
use crate::plan::{Node, Plan, PlanNode};
use async_trait::async_trait;
use std::sync::Arc;

/// Persistence of node execution records.
///
/// The store is the single source of truth for node state. Status changes go
/// through [`update_status_with_ops`](Self::update_status_with_ops), which must
/// be atomic with respect to the status check.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeExecutionService: Send + Sync {
    /// Loads a record.
    async fn get(&self, id: &str) -> Result<NodeExecution, EngineError>;

    /// Loads a record projected onto `fields`.
    async fn get_with_fields_included(
        &self,
        id: &str,
        fields: &[NodeField],
    ) -> Result<NodeExecution, EngineError>;

    /// Inserts or replaces a record.
    async fn save(&self, node_execution: NodeExecution) -> Result<NodeExecution, EngineError>;

    /// Inserts a batch of records in one unit of work.
    async fn save_all(&self, node_executions: Vec<NodeExecution>) -> Result<Vec<NodeExecution>, EngineError>;

    /// Applies `ops` and returns the updated record.
    async fn update(&self, id: &str, ops: UpdateOps) -> Result<NodeExecution, EngineError>;

    /// Applies `ops` without reading the record back.
    async fn update_v2(&self, id: &str, ops: UpdateOps) -> Result<(), EngineError>;

    /// Moves the record to `status` and applies `ops`, only if its current
    /// status is in `allowed_prior`.
    ///
    /// Returns `Ok(None)` when the guard fails; that is a lost race, not an
    /// error. An empty `allowed_prior` is rejected with
    /// [`EngineError::EmptyStatusGuard`].
    async fn update_status_with_ops(
        &self,
        id: &str,
        status: Status,
        ops: Option<UpdateOps>,
        allowed_prior: &StatusSet,
    ) -> Result<Option<NodeExecution>, EngineError>;

    /// Lists records matching `query`, ordered by start time.
    async fn get_all(&self, query: NodeExecutionQuery) -> Result<Vec<NodeExecution>, EngineError>;

    /// Flags the record as replaced by a newer attempt.
    ///
    /// Returns false when it was already flagged.
    async fn mark_retried(&self, id: &str) -> Result<bool, EngineError>;

    /// Moves every active record of a plan execution to ERRORED; returns how many moved.
    async fn error_out_active_nodes(&self, plan_execution_id: &str) -> Result<usize, EngineError>;

    /// The latest non-retried execution of a plan node in a plan execution.
    async fn get_by_plan_node_uuid(
        &self,
        plan_node_uuid: &str,
        plan_execution_id: &str,
    ) -> Result<Option<NodeExecution>, EngineError>;
}

/// Read access to authored plans.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanService: Send + Sync {
    /// Loads a whole plan.
    async fn fetch_plan(&self, plan_id: &str) -> Result<Plan, EngineError>;

    /// Loads one node of a plan.
    async fn fetch_node(&self, plan_id: &str, node_id: &str) -> Result<Node, EngineError>;
}

/// Named values produced by node executions (outcomes or sweeping outputs).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionOutputService: Send + Sync {
    /// Stores `value` under `name` for the node active in `ambiance`; returns the record id.
    async fn consume(
        &self,
        ambiance: &Ambiance,
        name: &str,
        value: serde_json::Value,
    ) -> Result<String, EngineError>;

    /// Resolves `name` for the node active in `ambiance`.
    async fn resolve(&self, ambiance: &Ambiance, name: &str) -> Result<Option<serde_json::Value>, EngineError>;

    /// Copies every value produced by `original_node_execution_id` onto the node
    /// active in `ambiance`; returns the names copied.
    async fn clone_for_retry_execution(
        &self,
        ambiance: &Ambiance,
        original_node_execution_id: &str,
    ) -> Result<Vec<String>, EngineError>;
}

/// Receives the results of the ids a waiter registered for.
#[async_trait]
pub trait NotifyCallback: Send + Sync {
    /// Called once, with one entry per awaited id.
    async fn notify(&self, responses: ResponseMap);
}

/// Bridges finished work to whoever waits on it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WaitNotifyEngine: Send + Sync {
    /// Signals that the work keyed by `notify_id` finished.
    async fn done_with(&self, notify_id: &str, data: ResponseData) -> Result<(), EngineError>;

    /// Runs `callback` once every id in `notify_ids` has been signalled.
    async fn wait_for(
        &self,
        notify_ids: Vec<String>,
        callback: Arc<dyn NotifyCallback>,
    ) -> Result<(), EngineError>;
}

/// Queues asynchronous advising for a finished node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeAdviseHelper: Send + Sync {
    /// Enqueues advising for `node_execution`, which just left `from_status`.
    async fn queue_advising_event(
        &self,
        node_execution: &NodeExecution,
        plan_node: &PlanNode,
        from_status: Status,
    ) -> Result<(), EngineError>;
}

/// Per-step detail blobs (console logs, unit progress history).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphStepDetailsService: Send + Sync {
    /// Copies the details of `old_node_execution_id` onto a new execution.
    async fn copy_step_details_for_retry(
        &self,
        old_node_execution_id: &str,
        new_plan_execution_id: &str,
        new_node_execution_id: &str,
    ) -> Result<(), EngineError>;
}

/// Plan-level bookkeeping for nodes nobody waits on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrchestrationEngine: Send + Sync {
    /// Called when the node active in `ambiance` finished without a waiter.
    async fn end_node_execution(&self, ambiance: &Ambiance) -> Result<(), EngineError>;
}
