//! Test fixtures for node execution testing.

use std::sync::Arc;

use super::mocks::RecordingOrchestrationEngine;
use crate::advise::AdviserRegistry;
use crate::ambiance::{Ambiance, Level, ACCOUNT_ID_KEY};
use crate::core::StepType;
use crate::engine::Engine;
use crate::errors::EngineError;
use crate::events::CollectingEventSink;
use crate::execution::NodeExecution;
use crate::notify::InMemoryWaitNotifyEngine;
use crate::plan::{IdentityPlanNode, Node, Plan, PlanNode};
use crate::steps::StepRegistry;
use crate::store::{InMemoryNodeExecutionService, InMemoryOutputStore, InMemoryPlanService, InMemoryStepDetailsStore};

/// Step type used by test plan nodes.
pub const TEST_STEP_TYPE: &str = "TEST_STEP_PLAN";

/// A plan node of the test step type with no advisers.
#[must_use]
pub fn plan_node(uuid: &str, identifier: &str) -> PlanNode {
    PlanNode::new(uuid, identifier, StepType::step(TEST_STEP_TYPE))
}

/// `node` replaying `original_node_execution_id`.
#[must_use]
pub fn identity_node(node: PlanNode, original_node_execution_id: &str) -> Node {
    Node::from(IdentityPlanNode::from_plan_node(node, original_node_execution_id))
}

/// Builds ambiances for one plan execution.
#[derive(Debug, Clone)]
pub struct AmbianceFixture {
    base: Ambiance,
}

impl AmbianceFixture {
    /// A fixture for `plan_execution_id` of `plan_id`.
    #[must_use]
    pub fn new(plan_id: &str, plan_execution_id: &str) -> Self {
        Self {
            base: Ambiance::new(plan_id, plan_execution_id),
        }
    }

    /// Adds an account id setup abstraction.
    #[must_use]
    pub fn with_account(mut self, account_id: &str) -> Self {
        self.base = self.base.with_setup_abstraction(ACCOUNT_ID_KEY, account_id);
        self
    }

    /// The ambiance without levels.
    #[must_use]
    pub fn base(&self) -> Ambiance {
        self.base.clone()
    }

    /// An ambiance whose only level runs plan node `setup_id` as `runtime_id`.
    #[must_use]
    pub fn node(&self, runtime_id: &str, setup_id: &str) -> Ambiance {
        self.base.clone_for_child(Level::new(runtime_id, setup_id))
    }
}

/// An [`Engine`] over in-memory collaborators, with handles on all of them.
#[derive(Debug)]
pub struct TestHarness {
    /// The engine.
    pub engine: Engine,
    /// Node execution records.
    pub node_executions: Arc<InMemoryNodeExecutionService>,
    /// Plans.
    pub plans: Arc<InMemoryPlanService>,
    /// Outcomes.
    pub outcomes: Arc<InMemoryOutputStore>,
    /// Sweeping outputs.
    pub sweeping_outputs: Arc<InMemoryOutputStore>,
    /// Wait-notify engine.
    pub wait_notify: Arc<InMemoryWaitNotifyEngine>,
    /// Step details.
    pub step_details: Arc<InMemoryStepDetailsStore>,
    /// Nodes that ended without a waiter.
    pub orchestration: Arc<RecordingOrchestrationEngine>,
    /// Lifecycle events.
    pub events: Arc<CollectingEventSink>,
}

impl TestHarness {
    /// Builds a harness running `steps` with the built-in advisers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(steps: StepRegistry) -> Result<Self, EngineError> {
        Self::with_advisers(steps, AdviserRegistry::with_defaults())
    }

    /// Builds a harness running `steps` advised by `advisers`.
    pub fn with_advisers(steps: StepRegistry, advisers: AdviserRegistry) -> Result<Self, EngineError> {
        let node_executions = Arc::new(InMemoryNodeExecutionService::new());
        let plans = Arc::new(InMemoryPlanService::new());
        let outcomes = Arc::new(InMemoryOutputStore::new());
        let sweeping_outputs = Arc::new(InMemoryOutputStore::new());
        let wait_notify = Arc::new(InMemoryWaitNotifyEngine::new());
        let step_details = Arc::new(InMemoryStepDetailsStore::new());
        let orchestration = Arc::new(RecordingOrchestrationEngine::new());
        let events = Arc::new(CollectingEventSink::new());

        let engine = Engine::builder(orchestration.clone())
            .with_node_executions(node_executions.clone())
            .with_plans(plans.clone())
            .with_outcomes(outcomes.clone())
            .with_sweeping_outputs(sweeping_outputs.clone())
            .with_wait_notify(wait_notify.clone())
            .with_step_details(step_details.clone())
            .with_steps(steps)
            .with_advisers(advisers)
            .with_events(events.clone())
            .build()?;

        Ok(Self {
            engine,
            node_executions,
            plans,
            outcomes,
            sweeping_outputs,
            wait_notify,
            step_details,
            orchestration,
            events,
        })
    }

    /// Registers `plan` and runs it as `plan_execution_id` until idle.
    pub async fn run_plan(&self, plan: Plan, plan_execution_id: &str) -> Result<NodeExecution, EngineError> {
        let ambiance = Ambiance::new(&plan.uuid, plan_execution_id);
        self.plans.insert(plan);
        let started = self.engine.start_plan(&ambiance).await?;
        self.engine.wait_idle().await;
        Ok(started)
    }

    /// Records of `plan_execution_id`, oldest first.
    #[must_use]
    pub fn executions_of(&self, plan_execution_id: &str) -> Vec<NodeExecution> {
        self.node_executions
            .snapshot()
            .into_iter()
            .filter(|ne| ne.plan_execution_id() == plan_execution_id)
            .collect()
    }

    /// The single current (not retried) record of plan node `node_id` in `plan_execution_id`.
    #[must_use]
    pub fn current(&self, plan_execution_id: &str, node_id: &str) -> Option<NodeExecution> {
        self.executions_of(plan_execution_id)
            .into_iter()
            .rev()
            .find(|ne| ne.node_id == node_id && !ne.old_retry)
    }
}
