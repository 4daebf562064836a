//! Span attributes for node executions.

use crate::ambiance::Ambiance;
use crate::execution::NodeExecution;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::Span;

/// Flat attributes describing one node execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpanAttributes {
    /// Node execution id.
    pub node_execution_id: String,
    /// Plan execution id.
    pub plan_execution_id: String,
    /// Plan id.
    pub plan_id: String,
    /// Plan node uuid.
    pub node_id: Option<String>,
    /// Plan node identifier.
    pub identifier: Option<String>,
    /// Step type name.
    pub step_type: Option<String>,
    /// Status.
    pub status: Option<String>,
    /// Execution mode.
    pub mode: Option<String>,
    /// Account id.
    pub account_id: Option<String>,
    /// Prior execution this one replays.
    pub original_node_execution_id: Option<String>,
}

impl NodeSpanAttributes {
    /// Attributes known from an ambiance alone.
    #[must_use]
    pub fn from_ambiance(ambiance: &Ambiance) -> Self {
        let level = ambiance.current_level();
        Self {
            node_execution_id: ambiance.current_runtime_id().unwrap_or_default().to_string(),
            plan_execution_id: ambiance.plan_execution_id.clone(),
            plan_id: ambiance.plan_id.clone(),
            node_id: level.map(|l| l.setup_id.clone()),
            identifier: level.and_then(|l| l.identifier.clone()),
            step_type: level.and_then(|l| l.step_type.as_ref().map(|t| t.type_name.clone())),
            account_id: ambiance.account_id().map(str::to_string),
            ..Self::default()
        }
    }

    /// Attributes of a stored record.
    #[must_use]
    pub fn from_node_execution(ne: &NodeExecution) -> Self {
        Self {
            node_execution_id: ne.uuid.clone(),
            node_id: Some(ne.node_id.clone()),
            identifier: Some(ne.identifier.clone()),
            step_type: Some(ne.step_type.type_name.clone()),
            status: Some(ne.status.to_string()),
            mode: Some(ne.mode.to_string()),
            original_node_execution_id: ne.original_node_execution_id.clone(),
            ..Self::from_ambiance(&ne.ambiance)
        }
    }

    /// Converts to a flat attribute map.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        attrs.insert("node.execution_id".to_string(), self.node_execution_id.clone());
        attrs.insert("plan.execution_id".to_string(), self.plan_execution_id.clone());
        attrs.insert("plan.id".to_string(), self.plan_id.clone());

        let optional = [
            ("node.id", &self.node_id),
            ("node.identifier", &self.identifier),
            ("node.step_type", &self.step_type),
            ("node.status", &self.status),
            ("node.mode", &self.mode),
            ("account.id", &self.account_id),
            ("node.original_execution_id", &self.original_node_execution_id),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                attrs.insert(key.to_string(), v.clone());
            }
        }
        attrs
    }

    /// An info span carrying the ids, for instrumenting node work.
    #[must_use]
    pub fn span(&self, name: &'static str) -> Span {
        tracing::info_span!(
            "node",
            op = name,
            node_execution_id = %self.node_execution_id,
            plan_execution_id = %self.plan_execution_id,
            identifier = self.identifier.as_deref().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiance::{Level, ACCOUNT_ID_KEY};
    use crate::core::StepType;
    use crate::plan::{Node, PlanNode};

    #[test]
    fn test_attributes_from_node_execution() {
        let plan_node = PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN"));
        let ambiance = Ambiance::new("plan", "exec")
            .with_setup_abstraction(ACCOUNT_ID_KEY, "acc")
            .clone_for_child(Level::for_node("ne-1", &plan_node));
        let ne = NodeExecution::queued("ne-1", ambiance, &Node::from(plan_node));

        let attrs = NodeSpanAttributes::from_node_execution(&ne).to_attributes();

        assert_eq!(attrs.get("node.execution_id").map(String::as_str), Some("ne-1"));
        assert_eq!(attrs.get("node.status").map(String::as_str), Some("QUEUED"));
        assert_eq!(attrs.get("account.id").map(String::as_str), Some("acc"));
        assert!(!attrs.contains_key("node.original_execution_id"));
    }

    #[test]
    fn test_attributes_from_empty_ambiance() {
        let attrs = NodeSpanAttributes::from_ambiance(&Ambiance::new("plan", "exec"));
        assert_eq!(attrs.node_execution_id, "");
        assert!(attrs.identifier.is_none());
        let _span = attrs.span("start");
    }
}
