//! Advise handlers: carry out an adviser response.

use crate::ambiance::Level;
use crate::core::{AdviseType, Status};
use crate::errors::EngineError;
use crate::execution::{AdviserResponse, NodeExecution, NodeExecutionUpdate, NodeRunMetadata, UpdateOps};
use crate::services::{NodeExecutionService, PlanService};
use crate::strategy::NodeRunner;
use crate::utils::{generate_id, now_millis};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Performs the effect of one advise type.
#[async_trait]
pub trait AdviseHandler: Send + Sync {
    /// Applies `response` to `node_execution`, using `runner` to schedule or end nodes.
    async fn handle_advise(
        &self,
        runner: &dyn NodeRunner,
        node_execution: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<(), EngineError>;
}

/// Schedules the successor node, or ends the branch when there is none.
#[derive(Clone)]
pub struct NextStepHandler {
    plan_service: Arc<dyn PlanService>,
    node_executions: Arc<dyn NodeExecutionService>,
}

impl NextStepHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(plan_service: Arc<dyn PlanService>, node_executions: Arc<dyn NodeExecutionService>) -> Self {
        Self {
            plan_service,
            node_executions,
        }
    }

    async fn advance(
        &self,
        runner: &dyn NodeRunner,
        ne: &NodeExecution,
        next_node_id: Option<&str>,
    ) -> Result<(), EngineError> {
        let Some(next_node_id) = next_node_id else {
            return runner.end_node_execution(&ne.ambiance).await;
        };

        let next = self.plan_service.fetch_node(&ne.ambiance.plan_id, next_node_id).await?;
        let ambiance = ne
            .ambiance
            .clone_for_sibling(Level::for_node(generate_id(), next.plan_node()));
        let metadata = NodeRunMetadata {
            notify_id: ne.notify_id.clone(),
            parent_id: ne.parent_id.clone(),
            previous_id: Some(ne.uuid.clone()),
            ..NodeRunMetadata::default()
        };
        debug!(
            node_execution_id = %ne.uuid,
            next_node_id,
            "Scheduling next step"
        );
        runner.run_node(&ambiance, &next, metadata).await?;
        Ok(())
    }
}

#[async_trait]
impl AdviseHandler for NextStepHandler {
    async fn handle_advise(
        &self,
        runner: &dyn NodeRunner,
        node_execution: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<(), EngineError> {
        let AdviserResponse::NextStep {
            next_node_id,
            to_status,
        } = response
        else {
            return Err(EngineError::Internal(format!(
                "next step handler received {}",
                response.advise_type()
            )));
        };

        if let Some(status) = *to_status {
            if status != node_execution.status {
                self.node_executions
                    .update_status_with_ops(&node_execution.uuid, status, None, &Status::allowed_prior_for(status))
                    .await?;
            }
        }
        self.advance(runner, node_execution, next_node_id.as_deref()).await
    }
}

/// Ends the branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndPlanHandler;

#[async_trait]
impl AdviseHandler for EndPlanHandler {
    async fn handle_advise(
        &self,
        runner: &dyn NodeRunner,
        node_execution: &NodeExecution,
        _response: &AdviserResponse,
    ) -> Result<(), EngineError> {
        runner.end_node_execution(&node_execution.ambiance).await
    }
}

/// Parks the node until an interrupt moves it on.
#[derive(Clone)]
pub struct InterventionWaitHandler {
    node_executions: Arc<dyn NodeExecutionService>,
}

impl InterventionWaitHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(node_executions: Arc<dyn NodeExecutionService>) -> Self {
        Self { node_executions }
    }
}

#[async_trait]
impl AdviseHandler for InterventionWaitHandler {
    async fn handle_advise(
        &self,
        _runner: &dyn NodeRunner,
        node_execution: &NodeExecution,
        _response: &AdviserResponse,
    ) -> Result<(), EngineError> {
        let updated = self
            .node_executions
            .update_status_with_ops(
                &node_execution.uuid,
                Status::InterventionWaiting,
                None,
                &Status::allowed_prior_for(Status::InterventionWaiting),
            )
            .await?;
        if updated.is_some() {
            info!(node_execution_id = %node_execution.uuid, "Node waiting for intervention");
        }
        Ok(())
    }
}

/// Starts a new attempt after the advised pause.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryHandler;

#[async_trait]
impl AdviseHandler for RetryHandler {
    async fn handle_advise(
        &self,
        runner: &dyn NodeRunner,
        node_execution: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<(), EngineError> {
        if let AdviserResponse::Retry { wait_interval_ms } = response {
            if *wait_interval_ms > 0 {
                tokio::time::sleep(Duration::from_millis(*wait_interval_ms)).await;
            }
        }
        if runner.retry_node_execution(node_execution, None).await?.is_none() {
            debug!(node_execution_id = %node_execution.uuid, "Node already retried");
        }
        Ok(())
    }
}

/// Marks the node SUCCEEDED, then advances like a next step.
#[derive(Clone)]
pub struct MarkSuccessHandler {
    next_step: NextStepHandler,
}

impl MarkSuccessHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(plan_service: Arc<dyn PlanService>, node_executions: Arc<dyn NodeExecutionService>) -> Self {
        Self {
            next_step: NextStepHandler::new(plan_service, node_executions),
        }
    }
}

#[async_trait]
impl AdviseHandler for MarkSuccessHandler {
    async fn handle_advise(
        &self,
        runner: &dyn NodeRunner,
        node_execution: &NodeExecution,
        response: &AdviserResponse,
    ) -> Result<(), EngineError> {
        let next_node_id = match response {
            AdviserResponse::MarkSuccess { next_node_id } => next_node_id.as_deref(),
            _ => None,
        };
        let updated = self
            .next_step
            .node_executions
            .update_status_with_ops(
                &node_execution.uuid,
                Status::Succeeded,
                Some(UpdateOps::new().set(NodeExecutionUpdate::EndTs(now_millis()))),
                &Status::mark_success_prior(),
            )
            .await?;
        let Some(updated) = updated else {
            debug!(node_execution_id = %node_execution.uuid, "Mark success lost the status guard");
            return Ok(());
        };
        self.next_step.advance(runner, &updated, next_node_id).await
    }
}

/// Handlers keyed by advise type, built once at startup.
#[derive(Clone, Default)]
pub struct AdviseHandlerFactory {
    handlers: HashMap<AdviseType, Arc<dyn AdviseHandler>>,
}

impl AdviseHandlerFactory {
    /// An empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory holding a handler for every advise type.
    #[must_use]
    pub fn with_defaults(plan_service: Arc<dyn PlanService>, node_executions: Arc<dyn NodeExecutionService>) -> Self {
        Self::new()
            .with_handler(
                AdviseType::NextStep,
                Arc::new(NextStepHandler::new(plan_service.clone(), node_executions.clone())),
            )
            .with_handler(AdviseType::EndPlan, Arc::new(EndPlanHandler))
            .with_handler(
                AdviseType::InterventionWait,
                Arc::new(InterventionWaitHandler::new(node_executions.clone())),
            )
            .with_handler(AdviseType::Retry, Arc::new(RetryHandler))
            .with_handler(
                AdviseType::MarkSuccess,
                Arc::new(MarkSuccessHandler::new(plan_service, node_executions)),
            )
    }

    /// Registers or replaces a handler.
    #[must_use]
    pub fn with_handler(mut self, advise_type: AdviseType, handler: Arc<dyn AdviseHandler>) -> Self {
        self.handlers.insert(advise_type, handler);
        self
    }

    /// Looks up the handler for `advise_type`.
    pub fn obtain_handler(&self, advise_type: AdviseType) -> Result<Arc<dyn AdviseHandler>, EngineError> {
        self.handlers
            .get(&advise_type)
            .cloned()
            .ok_or(EngineError::NoAdviseHandler(advise_type))
    }
}

impl std::fmt::Debug for AdviseHandlerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        types.sort();
        f.debug_struct("AdviseHandlerFactory").field("handlers", &types).finish()
    }
}

impl std::fmt::Debug for NextStepHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextStepHandler").finish_non_exhaustive()
    }
}
