//! Plan graphs and their nodes.
//!
//! A [`Plan`] is authored once; re-running part of a prior execution is
//! expressed by rewriting it with [`Plan::transform_for_retry`], which turns
//! every node that should replay into an [`IdentityPlanNode`].

mod node;

pub use node::{AdviserObtainment, IdentityPlanNode, Node, PlanNode};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A directed plan graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Plan id.
    pub uuid: String,
    /// Node the run starts from.
    pub start_node_id: String,
    /// All nodes of the plan.
    pub nodes: Vec<Node>,
}

impl Plan {
    /// Creates a plan.
    #[must_use]
    pub fn new(uuid: impl Into<String>, start_node_id: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            uuid: uuid.into(),
            start_node_id: start_node_id.into(),
            nodes,
        }
    }

    /// Looks up a node by uuid.
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.uuid() == node_id)
    }

    /// The start node.
    #[must_use]
    pub fn start_node(&self) -> Option<&Node> {
        self.node(&self.start_node_id)
    }

    /// Returns a copy of the plan where every node whose uuid is a key of
    /// `replay_map` (plan node uuid to prior node execution id) replays that
    /// execution. Nodes already replaying something are re-pointed.
    #[must_use]
    pub fn transform_for_retry(&self, replay_map: &HashMap<String, String>) -> Self {
        let nodes = self
            .nodes
            .iter()
            .map(|node| match replay_map.get(node.uuid()) {
                Some(original_id) => {
                    Node::from(IdentityPlanNode::from_plan_node(node.plan_node().clone(), original_id.clone()))
                }
                None => node.clone(),
            })
            .collect();

        Self {
            uuid: self.uuid.clone(),
            start_node_id: self.start_node_id.clone(),
            nodes,
        }
    }
}
