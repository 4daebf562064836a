//! Queued advising: computes advice off the strategy's call path.

use super::AdviserRegistry;
use crate::core::Status;
use crate::errors::EngineError;
use crate::execution::NodeExecution;
use crate::plan::PlanNode;
use crate::runtime::{InFlightGuard, WorkerPool};
use crate::services::{NodeAdviseHelper, NodeExecutionService};
use crate::strategy::NodeRunner;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One queued advising event.
#[derive(Debug)]
pub struct AdvisingRequest {
    /// The finished node execution.
    pub node_execution_id: String,
    /// Its plan node, with the obtainments to consult.
    pub plan_node: PlanNode,
    /// Status the node left.
    pub from_status: Status,
    _in_flight: InFlightGuard,
}

/// A [`NodeAdviseHelper`] that sends events to an [`AdvisingWorker`].
///
/// Each queued event keeps the worker pool busy until it has been processed.
#[derive(Debug, Clone)]
pub struct QueuedAdviseHelper {
    sender: mpsc::Sender<AdvisingRequest>,
    pool: WorkerPool,
}

impl QueuedAdviseHelper {
    /// Creates the helper and the receiving end for the worker.
    #[must_use]
    pub fn channel(capacity: usize, pool: WorkerPool) -> (Self, mpsc::Receiver<AdvisingRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender, pool }, receiver)
    }
}

#[async_trait]
impl NodeAdviseHelper for QueuedAdviseHelper {
    async fn queue_advising_event(
        &self,
        node_execution: &NodeExecution,
        plan_node: &PlanNode,
        from_status: Status,
    ) -> Result<(), EngineError> {
        let request = AdvisingRequest {
            node_execution_id: node_execution.uuid.clone(),
            plan_node: plan_node.clone(),
            from_status,
            _in_flight: self.pool.track(),
        };
        self.sender
            .send(request)
            .await
            .map_err(|_| EngineError::AdvisingQueueClosed)?;
        debug!(node_execution_id = %node_execution.uuid, "Queued advising event");
        Ok(())
    }
}

/// Consumes advising events: runs the advisers and hands the advice back to the runner.
#[derive(Debug)]
pub struct AdvisingWorker {
    handle: JoinHandle<()>,
}

impl AdvisingWorker {
    /// Spawns the worker loop.
    ///
    /// The loop ends when every sender is dropped or the runner is gone.
    pub fn spawn(
        mut receiver: mpsc::Receiver<AdvisingRequest>,
        runner: Weak<dyn NodeRunner>,
        advisers: AdviserRegistry,
        node_executions: Arc<dyn NodeExecutionService>,
        pool: WorkerPool,
    ) -> Self {
        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let Some(runner) = runner.upgrade() else {
                    warn!(node_execution_id = %request.node_execution_id, "Runner dropped, stopping advising");
                    break;
                };
                let advisers = advisers.clone();
                let node_executions = node_executions.clone();
                pool.submit("advise", async move {
                    let AdvisingRequest {
                        node_execution_id,
                        plan_node,
                        from_status,
                        _in_flight,
                    } = request;
                    let ne = node_executions.get(&node_execution_id).await?;
                    let response = match advisers.advise(&ne, &plan_node, from_status) {
                        Ok(response) => response,
                        Err(e) => {
                            warn!(node_execution_id = %ne.uuid, error = %e, "Advising failed, ending node");
                            None
                        }
                    };
                    let result = runner.process_adviser_response(&ne.ambiance, response).await;
                    if let Err(e) = &result {
                        if let Err(end_err) = runner.error_out_node_execution(&ne.ambiance, &e.to_string()).await {
                            warn!(node_execution_id = %ne.uuid, error = %end_err, "Could not error out node");
                        }
                    }
                    result
                });
            }
        });
        Self { handle }
    }

    /// True once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the loop without draining queued events.
    pub fn abort(&self) {
        self.handle.abort();
    }
}
