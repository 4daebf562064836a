//! Authored plan nodes.

use crate::core::{AdviserType, StepType};
use serde::{Deserialize, Serialize};

/// Declarative adviser configuration on a plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviserObtainment {
    /// Which adviser to consult.
    pub adviser_type: AdviserType,
    /// Adviser-specific parameters.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl AdviserObtainment {
    /// Creates an obtainment without parameters.
    #[must_use]
    pub fn new(adviser_type: AdviserType) -> Self {
        Self {
            adviser_type,
            parameters: serde_json::Value::Null,
        }
    }

    /// A next-step obtainment pointing at `next_node_id`.
    #[must_use]
    pub fn next_step(next_node_id: impl Into<String>) -> Self {
        Self {
            adviser_type: AdviserType::NextStep,
            parameters: serde_json::json!({ "nextNodeId": next_node_id.into() }),
        }
    }
}

/// A node of a plan: one step, stage or container, authored once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNode {
    /// Unique id of the node within its plan.
    pub uuid: String,
    /// Human-facing identifier.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// The executable behaviour.
    pub step_type: StepType,
    /// Fully qualified name of the owning stage, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_fqn: Option<String>,
    /// Parameters handed to the step behaviour.
    #[serde(default)]
    pub step_parameters: serde_json::Value,
    /// Advisers consulted in order once the node finishes.
    #[serde(default)]
    pub adviser_obtainments: Vec<AdviserObtainment>,
    /// Selects queued (asynchronous) advising when true.
    #[serde(default)]
    pub use_adviser_obtainments: bool,
}

impl PlanNode {
    /// Creates a plan node with no advisers.
    #[must_use]
    pub fn new(uuid: impl Into<String>, identifier: impl Into<String>, step_type: StepType) -> Self {
        let identifier = identifier.into();
        Self {
            uuid: uuid.into(),
            name: identifier.clone(),
            identifier,
            step_type,
            stage_fqn: None,
            step_parameters: serde_json::Value::Null,
            adviser_obtainments: Vec::new(),
            use_adviser_obtainments: false,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the owning stage fqn.
    #[must_use]
    pub fn with_stage_fqn(mut self, stage_fqn: impl Into<String>) -> Self {
        self.stage_fqn = Some(stage_fqn.into());
        self
    }

    /// Sets the step parameters.
    #[must_use]
    pub fn with_step_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.step_parameters = parameters;
        self
    }

    /// Appends an adviser obtainment.
    #[must_use]
    pub fn with_adviser(mut self, obtainment: AdviserObtainment) -> Self {
        self.adviser_obtainments.push(obtainment);
        self
    }

    /// Selects queued advising.
    #[must_use]
    pub fn with_use_adviser_obtainments(mut self, value: bool) -> Self {
        self.use_adviser_obtainments = value;
        self
    }
}

/// A plan node that replays a node execution from a prior run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPlanNode {
    /// The authored node being replayed.
    #[serde(flatten)]
    pub node: PlanNode,
    /// Node execution in the prior run whose result is reproduced.
    pub original_node_execution_id: String,
}

impl IdentityPlanNode {
    /// Wraps `node` as a replay of `original_node_execution_id`.
    ///
    /// Identity nodes always advise through the queue.
    #[must_use]
    pub fn from_plan_node(node: PlanNode, original_node_execution_id: impl Into<String>) -> Self {
        Self {
            node: node.with_use_adviser_obtainments(true),
            original_node_execution_id: original_node_execution_id.into(),
        }
    }
}

/// Any node a plan may hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "nodeType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Node {
    /// A freshly executed node.
    PlanNode(PlanNode),
    /// A replayed node.
    IdentityPlanNode(IdentityPlanNode),
}

impl Node {
    /// The authored node data common to both variants.
    #[must_use]
    pub fn plan_node(&self) -> &PlanNode {
        match self {
            Self::PlanNode(node) => node,
            Self::IdentityPlanNode(identity) => &identity.node,
        }
    }

    /// Node uuid.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.plan_node().uuid
    }

    /// Node identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.plan_node().identifier
    }

    /// Node step type.
    #[must_use]
    pub fn step_type(&self) -> &StepType {
        &self.plan_node().step_type
    }

    /// The replayed node execution id, for identity nodes.
    #[must_use]
    pub fn original_node_execution_id(&self) -> Option<&str> {
        match self {
            Self::PlanNode(_) => None,
            Self::IdentityPlanNode(identity) => Some(&identity.original_node_execution_id),
        }
    }

    /// True for identity nodes.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::IdentityPlanNode(_))
    }
}

impl From<PlanNode> for Node {
    fn from(node: PlanNode) -> Self {
        Self::PlanNode(node)
    }
}

impl From<IdentityPlanNode> for Node {
    fn from(node: IdentityPlanNode) -> Self {
        Self::IdentityPlanNode(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_node_forces_queued_advising() {
        let node = PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN"));
        assert!(!node.use_adviser_obtainments);

        let identity = IdentityPlanNode::from_plan_node(node, "ne-1");
        assert!(identity.node.use_adviser_obtainments);
        assert_eq!(identity.original_node_execution_id, "ne-1");
    }

    #[test]
    fn test_node_accessors() {
        let plan_node = PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN"));
        let node = Node::from(plan_node.clone());
        assert_eq!(node.uuid(), "uuid1");
        assert!(node.original_node_execution_id().is_none());

        let identity = Node::from(IdentityPlanNode::from_plan_node(plan_node, "ne-1"));
        assert_eq!(identity.identifier(), "test");
        assert_eq!(identity.original_node_execution_id(), Some("ne-1"));
        assert!(identity.is_identity());
    }

    #[test]
    fn test_node_serialization_tag() {
        let node = Node::from(IdentityPlanNode::from_plan_node(
            PlanNode::new("u", "i", StepType::step("S")),
            "orig",
        ));
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["nodeType"], "IDENTITY_PLAN_NODE");
        assert_eq!(json["originalNodeExecutionId"], "orig");
        assert_eq!(json["uuid"], "u");

        let restored: Node = serde_json::from_value(json).unwrap();
        assert_eq!(restored, node);
    }

    #[test]
    fn test_next_step_obtainment_parameters() {
        let obtainment = AdviserObtainment::next_step("n2");
        assert_eq!(obtainment.adviser_type, AdviserType::NextStep);
        assert_eq!(obtainment.parameters["nextNodeId"], "n2");
    }
}
