//! The node lifecycle surface seen by advise handlers and interrupts.

use crate::ambiance::Ambiance;
use crate::core::Status;
use crate::errors::EngineError;
use crate::execution::{AdviserResponse, NodeExecution, NodeRunMetadata, ResponseMap};
use crate::plan::Node;
use async_trait::async_trait;

/// Drives nodes through their lifecycle.
///
/// Handlers receive `&dyn NodeRunner` instead of the concrete strategy so they
/// can be tested against a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeRunner: Send + Sync {
    /// Persists a QUEUED execution of `node` and schedules it on the pool.
    ///
    /// The ambiance's current level must already carry the new runtime id.
    async fn run_node(
        &self,
        ambiance: &Ambiance,
        node: &Node,
        metadata: NodeRunMetadata,
    ) -> Result<NodeExecution, EngineError>;

    /// Injects out-of-band results into a suspended node and finishes it.
    async fn resume_node_execution(
        &self,
        ambiance: &Ambiance,
        responses: ResponseMap,
        async_error: bool,
    ) -> Result<(), EngineError>;

    /// Acts on advice for the node active in `ambiance`; `None` ends the node.
    async fn process_adviser_response(
        &self,
        ambiance: &Ambiance,
        response: Option<AdviserResponse>,
    ) -> Result<(), EngineError>;

    /// Computes or queues advice for a node that just left `from_status`.
    async fn dispatch_advice(&self, node_execution: &NodeExecution, from_status: Status) -> Result<(), EngineError>;

    /// Signals whoever waits on the node active in `ambiance`.
    async fn end_node_execution(&self, ambiance: &Ambiance) -> Result<(), EngineError>;

    /// Ends a node whose engine-side work failed with `message`.
    ///
    /// A node still in flight moves to ERRORED. A node that already finished
    /// but was never advised is ended as it stands. Aborted nodes are left
    /// alone, their interrupt already ended them.
    async fn error_out_node_execution(&self, ambiance: &Ambiance, message: &str) -> Result<(), EngineError>;

    /// Starts a fresh attempt of `node_execution`'s plan node.
    ///
    /// `interrupt_id` is set when the retry was requested by an interrupt.
    /// Returns `None` when another retry already replaced this attempt.
    async fn retry_node_execution(
        &self,
        node_execution: &NodeExecution,
        interrupt_id: Option<String>,
    ) -> Result<Option<NodeExecution>, EngineError>;
}
