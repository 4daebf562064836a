//! Recording collaborators and scripted steps for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::ambiance::Ambiance;
use crate::core::{Status, StatusSet};
use crate::errors::EngineError;
use crate::execution::{
    ExecutableResponse, NodeExecution, NodeExecutionQuery, NodeField, ResponseData, ResponseMap, StepResponse,
    UpdateOps,
};
use crate::notify::InMemoryWaitNotifyEngine;
use crate::services::{NodeAdviseHelper, NodeExecutionService, NotifyCallback, OrchestrationEngine, WaitNotifyEngine};
use crate::plan::PlanNode;
use crate::steps::{Step, StepOutcome};

/// Records every node that ended without a waiter.
#[derive(Debug, Default)]
pub struct RecordingOrchestrationEngine {
    calls: Mutex<Vec<Ambiance>>,
}

impl RecordingOrchestrationEngine {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ambiances passed to `end_node_execution`, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<Ambiance> {
        self.calls.lock().clone()
    }

    /// Runtime ids of the ended nodes.
    #[must_use]
    pub fn ended_runtime_ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|a| a.current_runtime_id().map(str::to_string))
            .collect()
    }

    /// Number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl OrchestrationEngine for RecordingOrchestrationEngine {
    async fn end_node_execution(&self, ambiance: &Ambiance) -> Result<(), EngineError> {
        self.calls.lock().push(ambiance.clone());
        Ok(())
    }
}

/// A [`WaitNotifyEngine`] that records signals before joining them in memory.
#[derive(Debug, Default)]
pub struct RecordingWaitNotifyEngine {
    inner: InMemoryWaitNotifyEngine,
    done: Mutex<Vec<(String, ResponseData)>>,
    waits: Mutex<Vec<Vec<String>>>,
}

impl RecordingWaitNotifyEngine {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `done_with` calls, in call order.
    #[must_use]
    pub fn done_calls(&self) -> Vec<(String, ResponseData)> {
        self.done.lock().clone()
    }

    /// Id sets passed to `wait_for`, in call order.
    #[must_use]
    pub fn waits(&self) -> Vec<Vec<String>> {
        self.waits.lock().clone()
    }
}

#[async_trait]
impl WaitNotifyEngine for RecordingWaitNotifyEngine {
    async fn done_with(&self, notify_id: &str, data: ResponseData) -> Result<(), EngineError> {
        self.done.lock().push((notify_id.to_string(), data.clone()));
        self.inner.done_with(notify_id, data).await
    }

    async fn wait_for(&self, notify_ids: Vec<String>, callback: Arc<dyn NotifyCallback>) -> Result<(), EngineError> {
        self.waits.lock().push(notify_ids.clone());
        self.inner.wait_for(notify_ids, callback).await
    }
}

/// One recorded `queue_advising_event` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedAdvice {
    /// The node execution.
    pub node_execution_id: String,
    /// Its plan node.
    pub plan_node_id: String,
    /// Status it left.
    pub from_status: Status,
}

/// Records advising events without processing them.
#[derive(Debug, Default)]
pub struct RecordingAdviseHelper {
    calls: Mutex<Vec<QueuedAdvice>>,
}

impl RecordingAdviseHelper {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued events, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<QueuedAdvice> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl NodeAdviseHelper for RecordingAdviseHelper {
    async fn queue_advising_event(
        &self,
        node_execution: &NodeExecution,
        plan_node: &PlanNode,
        from_status: Status,
    ) -> Result<(), EngineError> {
        self.calls.lock().push(QueuedAdvice {
            node_execution_id: node_execution.uuid.clone(),
            plan_node_id: plan_node.uuid.clone(),
            from_status,
        });
        Ok(())
    }
}

/// One recorded guarded update request.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedUpdate {
    /// Target record.
    pub node_execution_id: String,
    /// Requested status.
    pub status: Status,
    /// Guard passed with the request.
    pub allowed_prior: StatusSet,
    /// Whether the guard held.
    pub won: bool,
}

/// Wraps a [`NodeExecutionService`], counting calls and recording guarded updates.
pub struct RecordingNodeExecutionService {
    inner: Arc<dyn NodeExecutionService>,
    counts: Mutex<HashMap<&'static str, usize>>,
    guarded: Mutex<Vec<GuardedUpdate>>,
}

impl RecordingNodeExecutionService {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn NodeExecutionService>) -> Self {
        Self {
            inner,
            counts: Mutex::new(HashMap::new()),
            guarded: Mutex::new(Vec::new()),
        }
    }

    fn hit(&self, method: &'static str) {
        *self.counts.lock().entry(method).or_insert(0) += 1;
    }

    /// Calls made to `method` (e.g. `"save_all"`).
    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        self.counts.lock().get(method).copied().unwrap_or(0)
    }

    /// Guarded update requests, in call order.
    #[must_use]
    pub fn guarded_updates(&self) -> Vec<GuardedUpdate> {
        self.guarded.lock().clone()
    }
}

impl std::fmt::Debug for RecordingNodeExecutionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingNodeExecutionService")
            .field("counts", &*self.counts.lock())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NodeExecutionService for RecordingNodeExecutionService {
    async fn get(&self, id: &str) -> Result<NodeExecution, EngineError> {
        self.hit("get");
        self.inner.get(id).await
    }

    async fn get_with_fields_included(&self, id: &str, fields: &[NodeField]) -> Result<NodeExecution, EngineError> {
        self.hit("get_with_fields_included");
        self.inner.get_with_fields_included(id, fields).await
    }

    async fn save(&self, node_execution: NodeExecution) -> Result<NodeExecution, EngineError> {
        self.hit("save");
        self.inner.save(node_execution).await
    }

    async fn save_all(&self, node_executions: Vec<NodeExecution>) -> Result<Vec<NodeExecution>, EngineError> {
        self.hit("save_all");
        self.inner.save_all(node_executions).await
    }

    async fn update(&self, id: &str, ops: UpdateOps) -> Result<NodeExecution, EngineError> {
        self.hit("update");
        self.inner.update(id, ops).await
    }

    async fn update_v2(&self, id: &str, ops: UpdateOps) -> Result<(), EngineError> {
        self.hit("update_v2");
        self.inner.update_v2(id, ops).await
    }

    async fn update_status_with_ops(
        &self,
        id: &str,
        status: Status,
        ops: Option<UpdateOps>,
        allowed_prior: &StatusSet,
    ) -> Result<Option<NodeExecution>, EngineError> {
        self.hit("update_status_with_ops");
        let result = self.inner.update_status_with_ops(id, status, ops, allowed_prior).await?;
        self.guarded.lock().push(GuardedUpdate {
            node_execution_id: id.to_string(),
            status,
            allowed_prior: allowed_prior.clone(),
            won: result.is_some(),
        });
        Ok(result)
    }

    async fn get_all(&self, query: NodeExecutionQuery) -> Result<Vec<NodeExecution>, EngineError> {
        self.hit("get_all");
        self.inner.get_all(query).await
    }

    async fn mark_retried(&self, id: &str) -> Result<bool, EngineError> {
        self.hit("mark_retried");
        self.inner.mark_retried(id).await
    }

    async fn error_out_active_nodes(&self, plan_execution_id: &str) -> Result<usize, EngineError> {
        self.hit("error_out_active_nodes");
        self.inner.error_out_active_nodes(plan_execution_id).await
    }

    async fn get_by_plan_node_uuid(
        &self,
        plan_node_uuid: &str,
        plan_execution_id: &str,
    ) -> Result<Option<NodeExecution>, EngineError> {
        self.hit("get_by_plan_node_uuid");
        self.inner.get_by_plan_node_uuid(plan_node_uuid, plan_execution_id).await
    }
}

/// A step that replays a script of outcomes, then repeats a fallback.
///
/// A scripted `Err` makes `execute` fail with that message.
#[derive(Debug)]
pub struct ScriptedStep {
    script: Mutex<VecDeque<Result<StepOutcome, String>>>,
    fallback: Result<StepOutcome, String>,
    calls: Mutex<Vec<String>>,
    resumes: Mutex<Vec<ResponseMap>>,
}

impl ScriptedStep {
    /// A step that always returns `fallback`.
    #[must_use]
    pub fn new(fallback: Result<StepOutcome, String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
            resumes: Mutex::new(Vec::new()),
        }
    }

    /// A step that always succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::new(Ok(StepOutcome::Completed(StepResponse::succeeded())))
    }

    /// A step that always completes FAILED with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self::new(Ok(StepOutcome::Completed(StepResponse::failed(message))))
    }

    /// A step that always suspends with `executable`.
    #[must_use]
    pub fn suspending(executable: ExecutableResponse) -> Self {
        Self::new(Ok(StepOutcome::Suspended(executable)))
    }

    /// Queues `outcomes` ahead of the fallback.
    #[must_use]
    pub fn then(self, outcomes: Vec<Result<StepOutcome, String>>) -> Self {
        self.script.lock().extend(outcomes);
        self
    }

    /// Number of `execute` calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Runtime ids the step executed for, in call order.
    #[must_use]
    pub fn executed_runtime_ids(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Response maps handed to `handle_async_response`.
    #[must_use]
    pub fn resumes(&self) -> Vec<ResponseMap> {
        self.resumes.lock().clone()
    }
}

#[async_trait]
impl Step for ScriptedStep {
    async fn execute(&self, ambiance: &Ambiance, _parameters: &serde_json::Value) -> anyhow::Result<StepOutcome> {
        self.calls
            .lock()
            .push(ambiance.current_runtime_id().unwrap_or_default().to_string());
        let next = self.script.lock().pop_front().unwrap_or_else(|| self.fallback.clone());
        next.map_err(anyhow::Error::msg)
    }

    async fn handle_async_response(
        &self,
        _ambiance: &Ambiance,
        _parameters: &serde_json::Value,
        responses: &ResponseMap,
    ) -> anyhow::Result<StepResponse> {
        self.resumes.lock().push(responses.clone());
        Ok(crate::steps::summarize_responses(responses))
    }
}
