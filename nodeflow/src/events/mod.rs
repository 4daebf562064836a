//! Node lifecycle events.
//!
//! The strategy emits one event per transition it performs. Sinks decide what
//! to do with them; the default discards them.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::core::Status;
use crate::execution::NodeExecution;
use crate::utils::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of node lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeEventKind {
    /// The step of a node started running.
    #[serde(rename = "node.started")]
    Started,
    /// A guarded status update won.
    #[serde(rename = "node.status_changed")]
    StatusChanged,
    /// The node finished and its waiter or the plan was told.
    #[serde(rename = "node.ended")]
    Ended,
    /// An identity node replayed a prior execution.
    #[serde(rename = "node.replayed")]
    Replayed,
    /// A new attempt of the node was scheduled.
    #[serde(rename = "node.retried")]
    Retried,
}

impl NodeEventKind {
    /// The event type string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "node.started",
            Self::StatusChanged => "node.status_changed",
            Self::Ended => "node.ended",
            Self::Replayed => "node.replayed",
            Self::Retried => "node.retried",
        }
    }
}

impl fmt::Display for NodeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
    /// Event kind.
    pub kind: NodeEventKind,
    /// Node execution the event is about.
    pub node_execution_id: String,
    /// Owning plan execution.
    pub plan_execution_id: String,
    /// Plan node uuid.
    pub node_id: String,
    /// Status after the event.
    pub status: Status,
    /// Emission time (epoch millis).
    pub timestamp: i64,
    /// Extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl NodeEvent {
    /// Creates an event stamped now.
    #[must_use]
    pub fn new(
        kind: NodeEventKind,
        node_execution_id: impl Into<String>,
        plan_execution_id: impl Into<String>,
        node_id: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            kind,
            node_execution_id: node_execution_id.into(),
            plan_execution_id: plan_execution_id.into(),
            node_id: node_id.into(),
            status,
            timestamp: now_millis(),
            data: None,
        }
    }

    /// An event about `ne` in its current status.
    #[must_use]
    pub fn for_node(kind: NodeEventKind, ne: &NodeExecution) -> Self {
        Self::new(kind, &ne.uuid, ne.plan_execution_id(), &ne.node_id, ne.status)
    }

    /// Attaches data.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
