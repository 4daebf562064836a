//! Wiring: builds a strategy, its worker pool and advising queue from configuration.

use crate::advise::{AdviseHandlerFactory, AdviserRegistry, AdvisingWorker, QueuedAdviseHelper};
use crate::ambiance::{Ambiance, Level};
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::events::{EventSink, NoOpEventSink};
use crate::execution::{NodeExecution, NodeRunMetadata};
use crate::interrupts::{Interrupt, InterruptManager, InterruptOutcome};
use crate::notify::InMemoryWaitNotifyEngine;
use crate::observability::init_tracing;
use crate::runtime::WorkerPool;
use crate::services::{
    ExecutionOutputService, GraphStepDetailsService, NodeExecutionService, OrchestrationEngine, PlanService,
    WaitNotifyEngine,
};
use crate::steps::StepRegistry;
use crate::store::{InMemoryNodeExecutionService, InMemoryOutputStore, InMemoryPlanService, InMemoryStepDetailsStore};
use crate::strategy::{Collaborators, NodeExecutionStrategy, NodeRunner};
use crate::utils::generate_id;
use std::sync::Arc;
use tracing::info;

/// Builder for [`Engine`].
///
/// Every collaborator except the orchestration engine defaults to its
/// in-memory implementation.
pub struct EngineBuilder {
    config: EngineConfig,
    orchestration: Arc<dyn OrchestrationEngine>,
    node_executions: Option<Arc<dyn NodeExecutionService>>,
    plans: Option<Arc<dyn PlanService>>,
    outcomes: Option<Arc<dyn ExecutionOutputService>>,
    sweeping_outputs: Option<Arc<dyn ExecutionOutputService>>,
    wait_notify: Option<Arc<dyn WaitNotifyEngine>>,
    step_details: Option<Arc<dyn GraphStepDetailsService>>,
    steps: StepRegistry,
    advisers: AdviserRegistry,
    handlers: Option<AdviseHandlerFactory>,
    events: Arc<dyn EventSink>,
}

impl EngineBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the node execution store.
    #[must_use]
    pub fn with_node_executions(mut self, service: Arc<dyn NodeExecutionService>) -> Self {
        self.node_executions = Some(service);
        self
    }

    /// Sets the plan service.
    #[must_use]
    pub fn with_plans(mut self, service: Arc<dyn PlanService>) -> Self {
        self.plans = Some(service);
        self
    }

    /// Sets the outcome store.
    #[must_use]
    pub fn with_outcomes(mut self, service: Arc<dyn ExecutionOutputService>) -> Self {
        self.outcomes = Some(service);
        self
    }

    /// Sets the sweeping output store.
    #[must_use]
    pub fn with_sweeping_outputs(mut self, service: Arc<dyn ExecutionOutputService>) -> Self {
        self.sweeping_outputs = Some(service);
        self
    }

    /// Sets the wait-notify engine.
    #[must_use]
    pub fn with_wait_notify(mut self, service: Arc<dyn WaitNotifyEngine>) -> Self {
        self.wait_notify = Some(service);
        self
    }

    /// Sets the step details store.
    #[must_use]
    pub fn with_step_details(mut self, service: Arc<dyn GraphStepDetailsService>) -> Self {
        self.step_details = Some(service);
        self
    }

    /// Sets the step registry.
    #[must_use]
    pub fn with_steps(mut self, steps: StepRegistry) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the adviser registry.
    #[must_use]
    pub fn with_advisers(mut self, advisers: AdviserRegistry) -> Self {
        self.advisers = advisers;
        self
    }

    /// Replaces the default advise handlers.
    #[must_use]
    pub fn with_handlers(mut self, handlers: AdviseHandlerFactory) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Builds the engine and spawns its advising worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Engine, EngineError> {
        self.config.validate()?;

        let node_executions = self
            .node_executions
            .unwrap_or_else(|| Arc::new(InMemoryNodeExecutionService::new()));
        let plans = self.plans.unwrap_or_else(|| Arc::new(InMemoryPlanService::new()));
        let pool = WorkerPool::new(self.config.max_concurrent_nodes);
        let (advise_helper, receiver) = QueuedAdviseHelper::channel(self.config.advising_queue_capacity, pool.clone());
        let handlers = self
            .handlers
            .unwrap_or_else(|| AdviseHandlerFactory::with_defaults(plans.clone(), node_executions.clone()));

        let services = Collaborators {
            node_executions: node_executions.clone(),
            plans,
            outcomes: self.outcomes.unwrap_or_else(|| Arc::new(InMemoryOutputStore::new())),
            sweeping_outputs: self
                .sweeping_outputs
                .unwrap_or_else(|| Arc::new(InMemoryOutputStore::new())),
            wait_notify: self
                .wait_notify
                .unwrap_or_else(|| Arc::new(InMemoryWaitNotifyEngine::new())),
            advise_helper: Arc::new(advise_helper),
            step_details: self
                .step_details
                .unwrap_or_else(|| Arc::new(InMemoryStepDetailsStore::new())),
            orchestration: self.orchestration,
        };

        let strategy = NodeExecutionStrategy::new(
            services,
            self.steps,
            self.advisers.clone(),
            handlers,
            pool.clone(),
            self.events,
        );
        let runner: Arc<dyn NodeRunner> = strategy.clone();
        let worker = AdvisingWorker::spawn(
            receiver,
            Arc::downgrade(&runner),
            self.advisers,
            node_executions.clone(),
            pool,
        );

        info!(
            max_concurrent_nodes = self.config.max_concurrent_nodes,
            advising_queue_capacity = self.config.advising_queue_capacity,
            "Node execution engine ready"
        );
        Ok(Engine {
            interrupts: InterruptManager::new(node_executions, runner),
            config: self.config,
            strategy,
            worker,
        })
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

/// A running node execution engine.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    strategy: Arc<NodeExecutionStrategy>,
    interrupts: InterruptManager,
    worker: AdvisingWorker,
}

impl Engine {
    /// Starts a builder; `orchestration` receives nodes that end without a waiter.
    #[must_use]
    pub fn builder(orchestration: Arc<dyn OrchestrationEngine>) -> EngineBuilder {
        EngineBuilder {
            config: EngineConfig::default(),
            orchestration,
            node_executions: None,
            plans: None,
            outcomes: None,
            sweeping_outputs: None,
            wait_notify: None,
            step_details: None,
            steps: StepRegistry::new(),
            advisers: AdviserRegistry::with_defaults(),
            handlers: None,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Installs the global tracing subscriber from the configured [`crate::config::LogConfig`].
    pub fn init_tracing(&self) -> bool {
        init_tracing(&self.config.log)
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The strategy driving nodes.
    #[must_use]
    pub fn strategy(&self) -> &Arc<NodeExecutionStrategy> {
        &self.strategy
    }

    /// Schedules the start node of the plan named by `ambiance`.
    ///
    /// `ambiance` carries the plan ids and setup abstractions, and no levels.
    pub async fn start_plan(&self, ambiance: &Ambiance) -> Result<NodeExecution, EngineError> {
        let plan = self.strategy.services().plans.fetch_plan(&ambiance.plan_id).await?;
        let start = plan
            .start_node()
            .ok_or_else(|| EngineError::plan_node_not_found(&plan.uuid, &plan.start_node_id))?;
        let ambiance = ambiance.clone_for_child(Level::for_node(generate_id(), start.plan_node()));
        info!(
            plan_id = %plan.uuid,
            plan_execution_id = %ambiance.plan_execution_id,
            "Starting plan execution"
        );
        self.strategy
            .run_node(&ambiance, start, NodeRunMetadata::default())
            .await
    }

    /// Applies an interrupt.
    pub async fn interrupt(&self, interrupt: &Interrupt) -> Result<InterruptOutcome, EngineError> {
        self.interrupts.handle(interrupt).await
    }

    /// Waits until no node work is in flight.
    pub async fn wait_idle(&self) {
        self.strategy.pool().wait_idle().await;
    }

    /// Errors of node work that failed on the pool, oldest first.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.strategy.pool().failures()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{AdviserObtainment, Node, Plan};
    use crate::testing::{plan_node, RecordingOrchestrationEngine, ScriptedStep, TestHarness, TEST_STEP_TYPE};

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let err = Engine::builder(Arc::new(RecordingOrchestrationEngine::new()))
            .with_config(EngineConfig::new().with_advising_queue_capacity(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[tokio::test]
    async fn test_start_unknown_plan_fails() {
        let engine = Engine::builder(Arc::new(RecordingOrchestrationEngine::new()))
            .build()
            .unwrap();
        let err = engine
            .start_plan(&Ambiance::new("missing", "exec-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PlanNotFound { .. }));
    }

    #[tokio::test]
    async fn test_start_plan_creates_depth_one_start_node() {
        let steps = StepRegistry::new().with_step(TEST_STEP_TYPE, Arc::new(ScriptedStep::succeeding()));
        let harness = TestHarness::new(steps).unwrap();
        let plan = Plan::new(
            "plan",
            "uuid1",
            vec![
                Node::from(plan_node("uuid1", "first").with_adviser(AdviserObtainment::next_step("uuid2"))),
                Node::from(plan_node("uuid2", "second")),
            ],
        );

        let started = harness.run_plan(plan, "exec-1").await.unwrap();

        assert_eq!(started.node_id, "uuid1");
        assert_eq!(started.level_count, 1);
        assert_eq!(started.ambiance.current_runtime_id(), Some(started.uuid.as_str()));
        assert_eq!(harness.executions_of("exec-1").len(), 2);
        assert_eq!(harness.engine.strategy().pool().in_flight(), 0);
    }
}
