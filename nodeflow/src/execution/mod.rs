//! Node execution records and the values that flow through them.

mod interrupt;
mod node_execution;
mod query;
mod response;
mod update;

pub use interrupt::{InterruptConfig, InterruptEffect};
pub use node_execution::{ExecutableResponse, FailureInfo, NodeExecution, NodeField, UnitProgress};
pub use query::{NodeExecutionQuery, DEFAULT_PAGE_SIZE};
pub use response::{AdviserResponse, ResponseData, ResponseMap, StepResponse, StepResponseNotifyData};
pub use update::{NodeExecutionUpdate, UpdateOps};

/// Scheduling metadata passed to `run_node`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRunMetadata {
    /// Waiter key to signal when the node finishes.
    pub notify_id: Option<String>,
    /// Enclosing node execution.
    pub parent_id: Option<String>,
    /// Preceding sibling.
    pub previous_id: Option<String>,
    /// Ids of earlier attempts, for retries.
    pub retry_ids: Vec<String>,
    /// Interrupt history carried into the new attempt.
    pub interrupt_history: Vec<InterruptEffect>,
}

impl NodeRunMetadata {
    /// Metadata for a child node signalling `notify_id` under `parent_id`.
    #[must_use]
    pub fn child(notify_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            notify_id: Some(notify_id.into()),
            parent_id: Some(parent_id.into()),
            ..Self::default()
        }
    }

    /// Sets the preceding sibling.
    #[must_use]
    pub fn with_previous_id(mut self, previous_id: impl Into<String>) -> Self {
        self.previous_id = Some(previous_id.into());
        self
    }
}
