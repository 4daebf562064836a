//! Advisers: decide what follows a finished node.

use crate::core::{AdviserType, Status};
use crate::errors::EngineError;
use crate::execution::{AdviserResponse, NodeExecution};
use crate::plan::PlanNode;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Input handed to an adviser.
#[derive(Debug, Clone, Copy)]
pub struct AdvisingEvent<'a> {
    /// The finished node execution, in its new status.
    pub node_execution: &'a NodeExecution,
    /// Parameters of the obtainment being consulted.
    pub parameters: &'a serde_json::Value,
    /// Status the node left.
    pub from_status: Status,
}

impl AdvisingEvent<'_> {
    /// The node's current status.
    #[must_use]
    pub fn to_status(&self) -> Status {
        self.node_execution.status
    }
}

/// A pluggable decision procedure keyed by [`AdviserType`].
pub trait Adviser: Send + Sync {
    /// True if this adviser has something to say about `event`.
    fn can_advise(&self, event: &AdvisingEvent<'_>) -> bool;

    /// The advice; `None` defers to the next obtainment.
    fn on_advise_event(&self, event: &AdvisingEvent<'_>) -> Option<AdviserResponse>;
}

/// Advances to the `nextNodeId` parameter after a positive status.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextStepAdviser;

impl Adviser for NextStepAdviser {
    fn can_advise(&self, event: &AdvisingEvent<'_>) -> bool {
        event.to_status().is_positive()
    }

    fn on_advise_event(&self, event: &AdvisingEvent<'_>) -> Option<AdviserResponse> {
        let next_node_id = event
            .parameters
            .get("nextNodeId")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        Some(AdviserResponse::NextStep {
            next_node_id,
            to_status: None,
        })
    }
}

/// Advisers keyed by type, built once at startup.
#[derive(Clone, Default)]
pub struct AdviserRegistry {
    advisers: HashMap<AdviserType, Arc<dyn Adviser>>,
}

impl AdviserRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in advisers.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new().with_adviser(AdviserType::NextStep, Arc::new(NextStepAdviser))
    }

    /// Registers an adviser.
    #[must_use]
    pub fn with_adviser(mut self, adviser_type: AdviserType, adviser: Arc<dyn Adviser>) -> Self {
        self.advisers.insert(adviser_type, adviser);
        self
    }

    /// Looks up an adviser.
    pub fn get(&self, adviser_type: &AdviserType) -> Result<Arc<dyn Adviser>, EngineError> {
        self.advisers
            .get(adviser_type)
            .cloned()
            .ok_or_else(|| EngineError::NoAdviser(adviser_type.clone()))
    }

    /// Consults the node's obtainments in order; the first advice wins.
    ///
    /// `Ok(None)` means nobody advised, which ends the branch.
    pub fn advise(
        &self,
        node_execution: &NodeExecution,
        plan_node: &PlanNode,
        from_status: Status,
    ) -> Result<Option<AdviserResponse>, EngineError> {
        for obtainment in &plan_node.adviser_obtainments {
            let adviser = self.get(&obtainment.adviser_type)?;
            let event = AdvisingEvent {
                node_execution,
                parameters: &obtainment.parameters,
                from_status,
            };
            if !adviser.can_advise(&event) {
                continue;
            }
            if let Some(response) = adviser.on_advise_event(&event) {
                debug!(
                    node_execution_id = %node_execution.uuid,
                    adviser = %obtainment.adviser_type,
                    advise_type = %response.advise_type(),
                    "Adviser responded"
                );
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for AdviserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.advisers.keys().collect();
        types.sort();
        f.debug_struct("AdviserRegistry").field("advisers", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepType;
    use crate::execution::NodeExecution;
    use crate::plan::{AdviserObtainment, Node};
    use crate::testing::AmbianceFixture;

    struct AlwaysEnd;

    impl Adviser for AlwaysEnd {
        fn can_advise(&self, _event: &AdvisingEvent<'_>) -> bool {
            true
        }

        fn on_advise_event(&self, _event: &AdvisingEvent<'_>) -> Option<AdviserResponse> {
            Some(AdviserResponse::EndPlan)
        }
    }

    fn finished(plan_node: &PlanNode, status: Status) -> NodeExecution {
        let ambiance = AmbianceFixture::new("plan", "exec").node("ne-1", &plan_node.uuid);
        let mut ne = NodeExecution::queued("ne-1", ambiance, &Node::from(plan_node.clone()));
        ne.status = status;
        ne
    }

    #[test]
    fn test_next_step_adviser_reads_parameters() {
        let plan_node = PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN"))
            .with_adviser(AdviserObtainment::next_step("uuid2"));
        let ne = finished(&plan_node, Status::Succeeded);

        let response = AdviserRegistry::with_defaults()
            .advise(&ne, &plan_node, Status::Running)
            .unwrap();

        assert_eq!(response, Some(AdviserResponse::next_step("uuid2")));
    }

    #[test]
    fn test_next_step_adviser_skips_failed_nodes() {
        let plan_node = PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN"))
            .with_adviser(AdviserObtainment::next_step("uuid2"));
        let ne = finished(&plan_node, Status::Failed);

        let response = AdviserRegistry::with_defaults()
            .advise(&ne, &plan_node, Status::Running)
            .unwrap();
        assert!(response.is_none());
    }

    #[test]
    fn test_first_advising_obtainment_wins() {
        let custom = AdviserType::Custom("END".into());
        let plan_node = PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN"))
            .with_adviser(AdviserObtainment::new(custom.clone()))
            .with_adviser(AdviserObtainment::next_step("uuid2"));
        let ne = finished(&plan_node, Status::Succeeded);

        let registry = AdviserRegistry::with_defaults().with_adviser(custom, Arc::new(AlwaysEnd));
        let response = registry.advise(&ne, &plan_node, Status::Running).unwrap();

        assert_eq!(response, Some(AdviserResponse::EndPlan));
    }

    #[test]
    fn test_unknown_adviser_is_an_error() {
        let plan_node = PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN"))
            .with_adviser(AdviserObtainment::new(AdviserType::OnFail));
        let ne = finished(&plan_node, Status::Failed);

        let err = AdviserRegistry::with_defaults()
            .advise(&ne, &plan_node, Status::Running)
            .unwrap_err();
        assert!(matches!(err, EngineError::NoAdviser(AdviserType::OnFail)));
    }
}
