//! The node execution strategy.
//!
//! [`NodeExecutionStrategy`] moves one node at a time from QUEUED to a final
//! status. Every status change is a guarded update through the
//! [`NodeExecutionService`]; a lost guard means another transition (usually an
//! interrupt) got there first and the current path stops quietly.
//!
//! Identity plan nodes replay a prior execution instead of running their step:
//! outputs are cloned, leaf nodes take the original's status and advice, and
//! retried lineages of the original are copied into the new run.

mod runner;

#[cfg(test)]
pub use runner::MockNodeRunner;
pub use runner::NodeRunner;

use crate::advise::{AdviseHandlerFactory, AdviserRegistry};
use crate::ambiance::{Ambiance, Level};
use crate::core::Status;
use crate::errors::EngineError;
use crate::events::{EventSink, NodeEvent, NodeEventKind};
use crate::execution::{
    AdviserResponse, ExecutableResponse, FailureInfo, InterruptEffect, NodeExecution, NodeExecutionUpdate,
    NodeField, NodeRunMetadata, ResponseData, ResponseMap, StepResponse, StepResponseNotifyData, UpdateOps,
};
use crate::observability::NodeSpanAttributes;
use crate::plan::{Node, PlanNode};
use crate::retry::RetryHelper;
use crate::runtime::WorkerPool;
use crate::services::{
    ExecutionOutputService, GraphStepDetailsService, NodeAdviseHelper, NodeExecutionService, NotifyCallback,
    OrchestrationEngine, PlanService, WaitNotifyEngine,
};
use crate::steps::{summarize_responses, StepOutcome, StepRegistry};
use crate::utils::{generate_id, now_millis};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn, Instrument};

/// The collaborators a strategy drives nodes through.
#[derive(Clone)]
pub struct Collaborators {
    /// Node execution records.
    pub node_executions: Arc<dyn NodeExecutionService>,
    /// Plans.
    pub plans: Arc<dyn PlanService>,
    /// Step outcomes.
    pub outcomes: Arc<dyn ExecutionOutputService>,
    /// Sweeping outputs.
    pub sweeping_outputs: Arc<dyn ExecutionOutputService>,
    /// Waiters on finished nodes.
    pub wait_notify: Arc<dyn WaitNotifyEngine>,
    /// Queued advising.
    pub advise_helper: Arc<dyn NodeAdviseHelper>,
    /// Per-step detail blobs.
    pub step_details: Arc<dyn GraphStepDetailsService>,
    /// Plan-level bookkeeping.
    pub orchestration: Arc<dyn OrchestrationEngine>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Drives node executions; see the module docs.
pub struct NodeExecutionStrategy {
    me: Weak<Self>,
    services: Collaborators,
    retry_helper: RetryHelper,
    steps: StepRegistry,
    advisers: AdviserRegistry,
    handlers: AdviseHandlerFactory,
    pool: WorkerPool,
    events: Arc<dyn EventSink>,
}

impl NodeExecutionStrategy {
    /// Creates a strategy. Node work runs on `pool`.
    #[must_use]
    pub fn new(
        services: Collaborators,
        steps: StepRegistry,
        advisers: AdviserRegistry,
        handlers: AdviseHandlerFactory,
        pool: WorkerPool,
        events: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        let retry_helper = RetryHelper::new(services.node_executions.clone(), services.step_details.clone());
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            services,
            retry_helper,
            steps,
            advisers,
            handlers,
            pool,
            events,
        })
    }

    /// The pool node work runs on.
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// The collaborators.
    #[must_use]
    pub fn services(&self) -> &Collaborators {
        &self.services
    }

    fn strong(&self) -> Result<Arc<Self>, EngineError> {
        self.me
            .upgrade()
            .ok_or_else(|| EngineError::Internal("node execution strategy dropped".into()))
    }

    /// Submits work for the node active in `ambiance`. If the work fails, the
    /// node is errored out so its waiter is still signalled.
    fn submit_node_work<F>(&self, name: &str, ambiance: Ambiance, span: tracing::Span, work: F)
    where
        F: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let me = self.me.clone();
        self.pool.submit(
            name,
            async move {
                let result = work.await;
                if let (Err(e), Some(strategy)) = (&result, me.upgrade()) {
                    if let Err(end_err) = strategy.error_out_node_execution(&ambiance, &e.to_string()).await {
                        warn!(
                            plan_execution_id = %ambiance.plan_execution_id,
                            error = %end_err,
                            "Could not error out node"
                        );
                    }
                }
                result
            }
            .instrument(span),
        );
    }

    /// Builds and persists the QUEUED record for the node active in `ambiance`.
    ///
    /// Replays and retry copies also get the step details of the execution
    /// they originate from.
    pub async fn create_node_execution(
        &self,
        ambiance: &Ambiance,
        node: &Node,
        metadata: NodeRunMetadata,
    ) -> Result<NodeExecution, EngineError> {
        let uuid = ambiance.require_runtime_id()?;
        let ne = NodeExecution {
            notify_id: metadata.notify_id,
            parent_id: metadata.parent_id,
            previous_id: metadata.previous_id,
            retry_ids: metadata.retry_ids,
            interrupt_history: metadata.interrupt_history,
            ..NodeExecution::queued(uuid, ambiance.clone(), node)
        };
        let saved = self.services.node_executions.save(ne).await?;

        if let Some(original_id) = &saved.original_node_execution_id {
            self.retry_helper
                .copy_step_details_for_retry(original_id, saved.plan_execution_id(), &saved.uuid)
                .await?;
        }
        debug!(
            node_execution_id = %saved.uuid,
            plan_execution_id = %saved.plan_execution_id(),
            identifier = %saved.identifier,
            "Created node execution"
        );
        Ok(saved)
    }

    /// Runs the node active in `ambiance`: its step, or the replay of its original.
    pub async fn start_execution(&self, ambiance: &Ambiance) -> Result<(), EngineError> {
        let level = ambiance.require_current_level()?;
        let node = self
            .services
            .plans
            .fetch_node(&ambiance.plan_id, &level.setup_id)
            .await?;
        match node.original_node_execution_id() {
            Some(original_id) => self.start_replay(ambiance, &node, original_id).await,
            None => self.invoke_step(ambiance, node.plan_node()).await,
        }
    }

    async fn invoke_step(&self, ambiance: &Ambiance, plan_node: &PlanNode) -> Result<(), EngineError> {
        let id = ambiance.require_runtime_id()?;
        let running = self
            .services
            .node_executions
            .update_status_with_ops(
                id,
                Status::Running,
                Some(UpdateOps::new().set(NodeExecutionUpdate::StartTs(now_millis()))),
                &Status::allowed_prior_for(Status::Running),
            )
            .await?;
        let Some(running) = running else {
            debug!(node_execution_id = %id, "Start lost the status guard");
            return Ok(());
        };
        self.events.emit(NodeEvent::for_node(NodeEventKind::Started, &running)).await;
        info!(
            node_execution_id = %id,
            identifier = %running.identifier,
            step_type = %running.step_type,
            "Node started"
        );

        let outcome = match self.steps.get(&plan_node.step_type) {
            Ok(step) => match step.execute(ambiance, &plan_node.step_parameters).await {
                Ok(outcome) => outcome,
                Err(e) => StepOutcome::Completed(StepResponse::failed(format!("{e:#}"))),
            },
            Err(e) => StepOutcome::Completed(StepResponse::failed(e.to_string())),
        };

        match outcome {
            StepOutcome::Completed(response) => self.process_step_response(ambiance, response).await,
            StepOutcome::Suspended(executable) => self.suspend(ambiance, &running, executable).await,
        }
    }

    async fn suspend(
        &self,
        ambiance: &Ambiance,
        ne: &NodeExecution,
        executable: ExecutableResponse,
    ) -> Result<(), EngineError> {
        match &executable {
            ExecutableResponse::Child { child_node_id } => {
                let children = vec![child_node_id.clone()];
                self.spawn_children(ambiance, ne, children, executable).await
            }
            ExecutableResponse::Children { child_node_ids } => {
                let children = child_node_ids.clone();
                self.spawn_children(ambiance, ne, children, executable).await
            }
            ExecutableResponse::Async { callback_ids } => {
                let ids = callback_ids.clone();
                self.wait_out_of_band(ambiance, ne, ids, executable).await
            }
            ExecutableResponse::Task { task_id } => {
                let ids = vec![task_id.clone()];
                self.wait_out_of_band(ambiance, ne, ids, executable).await
            }
            ExecutableResponse::PipelineStage {
                child_plan_execution_id,
            } => {
                let ids = vec![child_plan_execution_id.clone()];
                self.wait_out_of_band(ambiance, ne, ids, executable).await
            }
            ExecutableResponse::Sync => {
                self.process_step_response(ambiance, StepResponse::succeeded()).await
            }
        }
    }

    fn resume_callback(&self, ambiance: &Ambiance) -> Arc<dyn NotifyCallback> {
        Arc::new(ResumeCallback {
            strategy: self.me.clone(),
            ambiance: ambiance.clone(),
        })
    }

    async fn wait_out_of_band(
        &self,
        ambiance: &Ambiance,
        ne: &NodeExecution,
        ids: Vec<String>,
        executable: ExecutableResponse,
    ) -> Result<(), EngineError> {
        let waiting = executable.waiting_status();
        let ops = UpdateOps::new()
            .set(NodeExecutionUpdate::Mode(executable.mode()))
            .set(NodeExecutionUpdate::AppendExecutableResponse(executable));
        let updated = self
            .services
            .node_executions
            .update_status_with_ops(&ne.uuid, waiting, Some(ops), &Status::allowed_prior_for(waiting))
            .await?;
        let Some(updated) = updated else {
            debug!(node_execution_id = %ne.uuid, "Suspension lost the status guard");
            return Ok(());
        };
        self.events
            .emit(NodeEvent::for_node(NodeEventKind::StatusChanged, &updated))
            .await;
        debug!(node_execution_id = %ne.uuid, status = %waiting, waiting_on = ids.len(), "Node suspended");
        self.services
            .wait_notify
            .wait_for(ids, self.resume_callback(ambiance))
            .await
    }

    async fn spawn_children(
        &self,
        ambiance: &Ambiance,
        ne: &NodeExecution,
        child_node_ids: Vec<String>,
        executable: ExecutableResponse,
    ) -> Result<(), EngineError> {
        self.services
            .node_executions
            .update_v2(
                &ne.uuid,
                UpdateOps::new()
                    .set(NodeExecutionUpdate::Mode(executable.mode()))
                    .set(NodeExecutionUpdate::AppendExecutableResponse(executable)),
            )
            .await?;

        // The join must exist before any child can signal it.
        let notify_ids: Vec<String> = child_node_ids.iter().map(|_| generate_id()).collect();
        self.services
            .wait_notify
            .wait_for(notify_ids.clone(), self.resume_callback(ambiance))
            .await?;

        for (child_node_id, notify_id) in child_node_ids.iter().zip(notify_ids) {
            let child = self
                .services
                .plans
                .fetch_node(&ambiance.plan_id, child_node_id)
                .await?;
            let child_ambiance = ambiance.clone_for_child(Level::for_node(generate_id(), child.plan_node()));
            self.run_node(&child_ambiance, &child, NodeRunMetadata::child(notify_id, ne.uuid.clone()))
                .await?;
        }
        Ok(())
    }

    async fn start_replay(&self, ambiance: &Ambiance, node: &Node, original_id: &str) -> Result<(), EngineError> {
        let id = ambiance.require_runtime_id()?;
        let original = self.services.node_executions.get(original_id).await?;
        self.events
            .emit(
                NodeEvent::new(
                    NodeEventKind::Replayed,
                    id,
                    &ambiance.plan_execution_id,
                    node.uuid(),
                    original.status,
                )
                .with_data(serde_json::json!({ "originalNodeExecutionId": original_id })),
            )
            .await;

        if original.status == Status::Skipped {
            let ops = UpdateOps::new()
                .set(NodeExecutionUpdate::EndTs(now_millis()))
                .set(NodeExecutionUpdate::AdviserResponse(original.adviser_response.clone()));
            let skipped = self
                .services
                .node_executions
                .update_status_with_ops(id, Status::Skipped, Some(ops), &Status::allowed_prior_for(Status::Skipped))
                .await?;
            if skipped.is_none() {
                debug!(node_execution_id = %id, "Skip replay lost the status guard");
                return Ok(());
            }
            return self
                .process_adviser_response(ambiance, original.adviser_response.clone())
                .await;
        }

        let outcomes = self
            .services
            .outcomes
            .clone_for_retry_execution(ambiance, original_id)
            .await?;
        let outputs = self
            .services
            .sweeping_outputs
            .clone_for_retry_execution(ambiance, original_id)
            .await?;
        debug!(
            node_execution_id = %id,
            original_node_execution_id = %original_id,
            outcomes = outcomes.len(),
            sweeping_outputs = outputs.len(),
            "Cloned outputs for replay"
        );

        if !original.mode.is_leaf() {
            return self.invoke_step(ambiance, node.plan_node()).await;
        }

        if original.mode.is_out_of_band() {
            // Out-of-band originals complete through a resume, like the real task would.
            let waiting = original
                .executable_responses
                .last()
                .map_or(Status::AsyncWaiting, ExecutableResponse::waiting_status);
            let updated = self
                .services
                .node_executions
                .update_status_with_ops(
                    id,
                    waiting,
                    Some(UpdateOps::new().set(NodeExecutionUpdate::Mode(original.mode))),
                    &Status::allowed_prior_for(waiting),
                )
                .await?;
            if updated.is_none() {
                debug!(node_execution_id = %id, "Replay suspension lost the status guard");
                return Ok(());
            }
            let me = self.strong()?;
            let resumed = ambiance.clone();
            let span = NodeSpanAttributes::from_ambiance(ambiance).span("resume");
            self.submit_node_work("resume_node_execution", ambiance.clone(), span, async move {
                me.resume_node_execution(&resumed, ResponseMap::new(), false).await
            });
            return Ok(());
        }

        let ne = self.services.node_executions.get(id).await?;
        self.handle_leaf_nodes(ambiance, &ne, &original).await
    }

    /// Applies a step result as a guarded status update, then advises.
    pub async fn process_step_response(&self, ambiance: &Ambiance, response: StepResponse) -> Result<(), EngineError> {
        let id = ambiance.require_runtime_id()?;
        let target = response.status;
        let mut ops = UpdateOps::new()
            .set(NodeExecutionUpdate::FailureInfo(response.failure_info))
            .set(NodeExecutionUpdate::UnitProgresses(response.unit_progresses));
        if target.is_final() {
            ops = ops.set(NodeExecutionUpdate::EndTs(now_millis()));
        }

        let updated = self
            .services
            .node_executions
            .update_status_with_ops(id, target, Some(ops), &Status::allowed_prior_for(target))
            .await?;
        let Some(ne) = updated else {
            debug!(node_execution_id = %id, status = %target, "Step response lost the status guard");
            return Ok(());
        };

        self.events
            .emit(NodeEvent::for_node(NodeEventKind::StatusChanged, &ne))
            .await;
        info!(
            node_execution_id = %ne.uuid,
            plan_execution_id = %ne.plan_execution_id(),
            status = %ne.status,
            "Node status changed"
        );

        let from_status = ne
            .executable_responses
            .last()
            .map_or(Status::Running, ExecutableResponse::waiting_status);
        self.dispatch_advice(&ne, from_status).await
    }

    /// Finishes a replayed leaf node with the status and advice of `original`.
    ///
    /// Earlier attempts of the original are copied into the new run first, so
    /// the replayed node keeps its retry lineage.
    pub async fn handle_leaf_nodes(
        &self,
        ambiance: &Ambiance,
        node_execution: &NodeExecution,
        original: &NodeExecution,
    ) -> Result<(), EngineError> {
        if !original.retry_ids.is_empty() {
            let lineage = NodeExecution {
                interrupt_history: original.interrupt_history.clone(),
                ..node_execution.clone()
            };
            self.retry_helper
                .copy_node_executions_for_retried_nodes(&lineage, &original.retry_ids)
                .await?;
        }

        let status = original.status;
        let mut ops = UpdateOps::new()
            .set(NodeExecutionUpdate::EndTs(original.end_ts.unwrap_or_else(now_millis)))
            .set(NodeExecutionUpdate::Mode(original.mode))
            .set(NodeExecutionUpdate::AdviserResponse(original.adviser_response.clone()))
            .set(NodeExecutionUpdate::FailureInfo(original.failure_info.clone()))
            .set(NodeExecutionUpdate::UnitProgresses(original.unit_progresses.clone()));
        if node_execution.step_type.is_pipeline_stage() {
            ops = ops.set(NodeExecutionUpdate::ExecutableResponses(
                original.executable_responses.clone(),
            ));
        }

        let updated = self
            .services
            .node_executions
            .update_status_with_ops(&node_execution.uuid, status, Some(ops), &Status::allowed_prior_for(status))
            .await?;
        let Some(updated) = updated else {
            debug!(node_execution_id = %node_execution.uuid, "Leaf replay lost the status guard");
            return Ok(());
        };
        self.events
            .emit(NodeEvent::for_node(NodeEventKind::StatusChanged, &updated))
            .await;

        self.process_adviser_response(ambiance, original.adviser_response.clone())
            .await
    }
}

#[async_trait]
impl NodeRunner for NodeExecutionStrategy {
    async fn run_node(
        &self,
        ambiance: &Ambiance,
        node: &Node,
        metadata: NodeRunMetadata,
    ) -> Result<NodeExecution, EngineError> {
        let ne = self.create_node_execution(ambiance, node, metadata).await?;
        let me = self.strong()?;
        let started = ambiance.clone();
        let span = NodeSpanAttributes::from_node_execution(&ne).span("start");
        self.submit_node_work("start_execution", ambiance.clone(), span, async move {
            me.start_execution(&started).await
        });
        Ok(ne)
    }

    async fn resume_node_execution(
        &self,
        ambiance: &Ambiance,
        responses: ResponseMap,
        async_error: bool,
    ) -> Result<(), EngineError> {
        let id = ambiance.require_runtime_id()?;
        let ne = self.services.node_executions.get(id).await?;

        if let Some(original_id) = &ne.original_node_execution_id {
            let original = self.services.node_executions.get(original_id).await?;
            if original.mode.is_leaf() {
                return self.handle_leaf_nodes(ambiance, &ne, &original).await;
            }
        }

        let response = if async_error {
            summarize_responses(&responses)
        } else {
            let node = self
                .services
                .plans
                .fetch_node(&ambiance.plan_id, &ne.node_id)
                .await?;
            let plan_node = node.plan_node();
            match self.steps.get(&plan_node.step_type) {
                Ok(step) => step
                    .handle_async_response(ambiance, &plan_node.step_parameters, &responses)
                    .await
                    .unwrap_or_else(|e| StepResponse::failed(format!("{e:#}"))),
                Err(e) => StepResponse::failed(e.to_string()),
            }
        };
        debug!(
            node_execution_id = %id,
            responses = responses.len(),
            async_error,
            status = %response.status,
            "Resuming node"
        );
        self.process_step_response(ambiance, response).await
    }

    async fn process_adviser_response(
        &self,
        ambiance: &Ambiance,
        response: Option<AdviserResponse>,
    ) -> Result<(), EngineError> {
        let Some(response) = response else {
            return self.end_node_execution(ambiance).await;
        };
        let id = ambiance.require_runtime_id()?;
        let ne = self
            .services
            .node_executions
            .update(
                id,
                UpdateOps::new().set(NodeExecutionUpdate::AdviserResponse(Some(response.clone()))),
            )
            .await?;
        let handler = self.handlers.obtain_handler(response.advise_type())?;
        handler.handle_advise(self, &ne, &response).await
    }

    async fn dispatch_advice(&self, node_execution: &NodeExecution, from_status: Status) -> Result<(), EngineError> {
        let node = self
            .services
            .plans
            .fetch_node(&node_execution.ambiance.plan_id, &node_execution.node_id)
            .await?;
        let plan_node = node.plan_node();
        if plan_node.use_adviser_obtainments {
            return self
                .services
                .advise_helper
                .queue_advising_event(node_execution, plan_node, from_status)
                .await;
        }

        let response = match self.advisers.advise(node_execution, plan_node, from_status) {
            Ok(response) => response,
            Err(e) => {
                warn!(node_execution_id = %node_execution.uuid, error = %e, "Advising failed, ending node");
                None
            }
        };
        self.process_adviser_response(&node_execution.ambiance, response)
            .await
    }

    async fn end_node_execution(&self, ambiance: &Ambiance) -> Result<(), EngineError> {
        let id = ambiance.require_runtime_id()?;
        let ne = self
            .services
            .node_executions
            .get_with_fields_included(id, NodeField::END_NODE_FIELDS)
            .await?;
        self.events.emit(NodeEvent::for_node(NodeEventKind::Ended, &ne)).await;

        match &ne.notify_id {
            Some(notify_id) => {
                let data = StepResponseNotifyData {
                    node_uuid: ne.node_id.clone(),
                    adviser_response: ne.adviser_response.clone(),
                    status: ne.status,
                    identifier: ne.identifier.clone(),
                    node_execution_id: ne.uuid.clone(),
                };
                self.services
                    .wait_notify
                    .done_with(notify_id, ResponseData::Notify(data))
                    .await?;
            }
            None => self.services.orchestration.end_node_execution(ambiance).await?,
        }
        info!(
            node_execution_id = %ne.uuid,
            status = %ne.status,
            notified = ne.notify_id.is_some(),
            "Node ended"
        );
        Ok(())
    }

    async fn error_out_node_execution(&self, ambiance: &Ambiance, message: &str) -> Result<(), EngineError> {
        let id = ambiance.require_runtime_id()?;
        let ops = UpdateOps::new()
            .set(NodeExecutionUpdate::FailureInfo(Some(FailureInfo::new(message))))
            .set(NodeExecutionUpdate::EndTs(now_millis()));
        let errored = self
            .services
            .node_executions
            .update_status_with_ops(id, Status::Errored, Some(ops), &Status::allowed_prior_for(Status::Errored))
            .await?;
        match errored {
            Some(ne) => {
                self.events
                    .emit(NodeEvent::for_node(NodeEventKind::StatusChanged, &ne))
                    .await;
                warn!(node_execution_id = %id, error = %message, "Node errored");
            }
            None => {
                let ne = self
                    .services
                    .node_executions
                    .get_with_fields_included(id, NodeField::END_NODE_FIELDS)
                    .await?;
                if !ne.status.is_final() || ne.status == Status::Aborted {
                    debug!(node_execution_id = %id, status = %ne.status, "Error out lost the status guard");
                    return Ok(());
                }
                warn!(node_execution_id = %id, status = %ne.status, error = %message, "Ending node after failure");
            }
        }
        self.end_node_execution(ambiance).await
    }

    async fn retry_node_execution(
        &self,
        node_execution: &NodeExecution,
        interrupt_id: Option<String>,
    ) -> Result<Option<NodeExecution>, EngineError> {
        if !self.services.node_executions.mark_retried(&node_execution.uuid).await? {
            debug!(node_execution_id = %node_execution.uuid, "Already retried");
            return Ok(None);
        }

        let node = self
            .services
            .plans
            .fetch_node(&node_execution.ambiance.plan_id, &node_execution.node_id)
            .await?;
        let new_uuid = generate_id();
        let retry_index = u32::try_from(node_execution.retry_ids.len() + 1).unwrap_or(u32::MAX);
        let ambiance = node_execution
            .ambiance
            .clone_for_sibling(Level::for_node(new_uuid.clone(), node.plan_node()).with_retry_index(retry_index));

        let mut interrupt_history = node_execution.interrupt_history.clone();
        if let Some(interrupt_id) = interrupt_id {
            interrupt_history.push(InterruptEffect::retry(interrupt_id, new_uuid.clone(), now_millis()));
        }
        let mut retry_ids = node_execution.retry_ids.clone();
        retry_ids.push(node_execution.uuid.clone());

        let metadata = NodeRunMetadata {
            notify_id: node_execution.notify_id.clone(),
            parent_id: node_execution.parent_id.clone(),
            previous_id: node_execution.previous_id.clone(),
            retry_ids,
            interrupt_history,
        };
        let retried = self.run_node(&ambiance, &node, metadata).await?;
        self.events
            .emit(
                NodeEvent::for_node(NodeEventKind::Retried, &retried)
                    .with_data(serde_json::json!({ "retryOf": node_execution.uuid })),
            )
            .await;
        info!(
            node_execution_id = %retried.uuid,
            retry_of = %node_execution.uuid,
            retry_index,
            "Node retried"
        );
        Ok(Some(retried))
    }
}

impl std::fmt::Debug for NodeExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutionStrategy")
            .field("steps", &self.steps)
            .field("advisers", &self.advisers)
            .field("handlers", &self.handlers)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Resumes a suspended node once everything it waits on has reported.
struct ResumeCallback {
    strategy: Weak<NodeExecutionStrategy>,
    ambiance: Ambiance,
}

#[async_trait]
impl NotifyCallback for ResumeCallback {
    async fn notify(&self, responses: ResponseMap) {
        let Some(strategy) = self.strategy.upgrade() else {
            warn!(
                plan_execution_id = %self.ambiance.plan_execution_id,
                "Strategy dropped before resume"
            );
            return;
        };
        let async_error = responses.values().any(|data| matches!(data, ResponseData::Error { .. }));
        let ambiance = self.ambiance.clone();
        let span = NodeSpanAttributes::from_ambiance(&ambiance).span("resume");
        let runner = strategy.clone();
        strategy.submit_node_work("resume_node_execution", self.ambiance.clone(), span, async move {
            runner.resume_node_execution(&ambiance, responses, async_error).await
        });
    }
}
