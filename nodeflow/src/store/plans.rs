//! In-memory plan registry.

use crate::errors::EngineError;
use crate::plan::{Node, Plan};
use crate::services::PlanService;
use async_trait::async_trait;
use dashmap::DashMap;

/// A [`PlanService`] holding plans in memory.
#[derive(Debug, Default)]
pub struct InMemoryPlanService {
    plans: DashMap<String, Plan>,
}

impl InMemoryPlanService {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a plan.
    pub fn insert(&self, plan: Plan) {
        self.plans.insert(plan.uuid.clone(), plan);
    }
}

#[async_trait]
impl PlanService for InMemoryPlanService {
    async fn fetch_plan(&self, plan_id: &str) -> Result<Plan, EngineError> {
        self.plans
            .get(plan_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| EngineError::PlanNotFound {
                plan_id: plan_id.to_string(),
            })
    }

    async fn fetch_node(&self, plan_id: &str, node_id: &str) -> Result<Node, EngineError> {
        let plan = self.plans.get(plan_id).ok_or_else(|| EngineError::PlanNotFound {
            plan_id: plan_id.to_string(),
        })?;
        plan.node(node_id)
            .cloned()
            .ok_or_else(|| EngineError::plan_node_not_found(plan_id, node_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepType;
    use crate::plan::PlanNode;

    #[tokio::test]
    async fn test_fetch_node() {
        let service = InMemoryPlanService::new();
        service.insert(Plan::new(
            "plan",
            "uuid1",
            vec![PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN")).into()],
        ));

        let node = service.fetch_node("plan", "uuid1").await.unwrap();
        assert_eq!(node.identifier(), "test");

        let err = service.fetch_node("plan", "nope").await.unwrap_err();
        assert!(matches!(err, EngineError::PlanNodeNotFound { .. }));
        let err = service.fetch_plan("other").await.unwrap_err();
        assert!(matches!(err, EngineError::PlanNotFound { .. }));
    }
}
