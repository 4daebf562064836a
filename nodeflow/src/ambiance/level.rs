//! One entry of the ambiance level stack.

use crate::core::StepType;
use crate::plan::PlanNode;
use crate::utils::now_millis;
use serde::{Deserialize, Serialize};

/// A nesting level: pipeline, stage, step, ...
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    /// Id of the node execution active at this level.
    pub runtime_id: String,
    /// Uuid of the plan node this level runs.
    pub setup_id: String,
    /// Node identifier, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// When the level was entered (epoch millis).
    pub start_ts: i64,
    /// Step type of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<StepType>,
    /// Attempt number of this node, 0 for the first run.
    #[serde(default)]
    pub retry_index: u32,
}

impl Level {
    /// Creates a level starting now.
    #[must_use]
    pub fn new(runtime_id: impl Into<String>, setup_id: impl Into<String>) -> Self {
        Self {
            runtime_id: runtime_id.into(),
            setup_id: setup_id.into(),
            identifier: None,
            start_ts: now_millis(),
            step_type: None,
            retry_index: 0,
        }
    }

    /// A level running `node` as node execution `runtime_id`.
    #[must_use]
    pub fn for_node(runtime_id: impl Into<String>, node: &PlanNode) -> Self {
        Self::new(runtime_id, node.uuid.clone())
            .with_identifier(node.identifier.clone())
            .with_step_type(node.step_type.clone())
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Sets the step type.
    #[must_use]
    pub fn with_step_type(mut self, step_type: StepType) -> Self {
        self.step_type = Some(step_type);
        self
    }

    /// Sets the retry index.
    #[must_use]
    pub fn with_retry_index(mut self, retry_index: u32) -> Self {
        self.retry_index = retry_index;
        self
    }
}
