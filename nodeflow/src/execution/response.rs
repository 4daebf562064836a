//! Step results, adviser decisions and notify payloads.

use super::{FailureInfo, UnitProgress};
use crate::core::{AdviseType, Status};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What should happen after a node finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum AdviserResponse {
    /// Schedule the next sibling node.
    NextStep {
        /// Plan node uuid of the successor; absent ends the branch.
        next_node_id: Option<String>,
        /// Status to move the finished node to before advancing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_status: Option<Status>,
    },
    /// End this branch of the plan.
    EndPlan,
    /// Run the node again after a pause.
    Retry {
        /// Delay before the new attempt.
        #[serde(default)]
        wait_interval_ms: u64,
    },
    /// Wait for a manual intervention.
    InterventionWait {
        /// Optional expiry of the wait.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Mark the node successful and continue.
    MarkSuccess {
        /// Successor to schedule.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_node_id: Option<String>,
    },
}

impl AdviserResponse {
    /// A next-step response.
    #[must_use]
    pub fn next_step(next_node_id: impl Into<String>) -> Self {
        Self::NextStep {
            next_node_id: Some(next_node_id.into()),
            to_status: None,
        }
    }

    /// The advise type used to look up a handler.
    #[must_use]
    pub fn advise_type(&self) -> AdviseType {
        match self {
            Self::NextStep { .. } => AdviseType::NextStep,
            Self::EndPlan => AdviseType::EndPlan,
            Self::Retry { .. } => AdviseType::Retry,
            Self::InterventionWait { .. } => AdviseType::InterventionWait,
            Self::MarkSuccess { .. } => AdviseType::MarkSuccess,
        }
    }
}

/// The result of running a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    /// Status the node should move to.
    pub status: Status,
    /// Failure details for broken statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_info: Option<FailureInfo>,
    /// Unit progresses reported by the step.
    #[serde(default)]
    pub unit_progresses: Vec<UnitProgress>,
}

impl StepResponse {
    /// A response with the given status.
    #[must_use]
    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            failure_info: None,
            unit_progresses: Vec::new(),
        }
    }

    /// A SUCCEEDED response.
    #[must_use]
    pub fn succeeded() -> Self {
        Self::with_status(Status::Succeeded)
    }

    /// A FAILED response carrying `message`.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            failure_info: Some(FailureInfo::new(message)),
            unit_progresses: Vec::new(),
        }
    }

    /// Attaches unit progresses.
    #[must_use]
    pub fn with_unit_progresses(mut self, unit_progresses: Vec<UnitProgress>) -> Self {
        self.unit_progresses = unit_progresses;
        self
    }
}

/// Payload handed to the waiter of a finished node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponseNotifyData {
    /// Plan node uuid.
    pub node_uuid: String,
    /// The node's adviser response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adviser_response: Option<AdviserResponse>,
    /// The node's final status.
    pub status: Status,
    /// Plan node identifier.
    pub identifier: String,
    /// The finished node execution.
    pub node_execution_id: String,
}

/// One entry of the map handed to a resumed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseData {
    /// A child node finished.
    Notify(StepResponseNotifyData),
    /// A remote task or callback reported a result.
    Task {
        /// Result payload.
        payload: serde_json::Value,
    },
    /// The out-of-band work failed.
    Error {
        /// Failure message.
        message: String,
    },
}

/// Results keyed by callback or notify id.
pub type ResponseMap = HashMap<String, ResponseData>;
