//! Field updates applied to a node execution by the store.

use super::{AdviserResponse, ExecutableResponse, FailureInfo, InterruptEffect, NodeExecution, UnitProgress};
use crate::core::ExecutionMode;
use crate::utils::now_millis;

/// One field update.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeExecutionUpdate {
    /// Set the execution mode.
    Mode(ExecutionMode),
    /// Set the start timestamp.
    StartTs(i64),
    /// Set the end timestamp.
    EndTs(i64),
    /// Replace the adviser response.
    AdviserResponse(Option<AdviserResponse>),
    /// Replace the failure info.
    FailureInfo(Option<FailureInfo>),
    /// Replace the retry ids.
    RetryIds(Vec<String>),
    /// Replace the interrupt history.
    InterruptHistory(Vec<InterruptEffect>),
    /// Append one interrupt effect.
    AppendInterrupt(InterruptEffect),
    /// Replace the executable responses.
    ExecutableResponses(Vec<ExecutableResponse>),
    /// Append one executable response.
    AppendExecutableResponse(ExecutableResponse),
    /// Replace the unit progresses.
    UnitProgresses(Vec<UnitProgress>),
    /// Set the old-retry flag.
    OldRetry(bool),
}

/// An ordered batch of field updates, applied together with a status change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateOps(Vec<NodeExecutionUpdate>);

impl UpdateOps {
    /// An empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an update.
    #[must_use]
    pub fn set(mut self, update: NodeExecutionUpdate) -> Self {
        self.0.push(update);
        self
    }

    /// True when no update is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The queued updates.
    #[must_use]
    pub fn updates(&self) -> &[NodeExecutionUpdate] {
        &self.0
    }

    /// Applies every update in order and bumps `last_updated_at`.
    pub fn apply(&self, ne: &mut NodeExecution) {
        for update in &self.0 {
            match update {
                NodeExecutionUpdate::Mode(mode) => ne.mode = *mode,
                NodeExecutionUpdate::StartTs(ts) => ne.start_ts = *ts,
                NodeExecutionUpdate::EndTs(ts) => ne.end_ts = Some(*ts),
                NodeExecutionUpdate::AdviserResponse(response) => ne.adviser_response.clone_from(response),
                NodeExecutionUpdate::FailureInfo(info) => ne.failure_info.clone_from(info),
                NodeExecutionUpdate::RetryIds(ids) => ne.retry_ids.clone_from(ids),
                NodeExecutionUpdate::InterruptHistory(history) => ne.interrupt_history.clone_from(history),
                NodeExecutionUpdate::AppendInterrupt(effect) => ne.interrupt_history.push(effect.clone()),
                NodeExecutionUpdate::ExecutableResponses(responses) => {
                    ne.executable_responses.clone_from(responses);
                }
                NodeExecutionUpdate::AppendExecutableResponse(response) => {
                    ne.executable_responses.push(response.clone());
                }
                NodeExecutionUpdate::UnitProgresses(progresses) => ne.unit_progresses.clone_from(progresses),
                NodeExecutionUpdate::OldRetry(value) => ne.old_retry = *value,
            }
        }
        ne.last_updated_at = now_millis();
    }
}

impl From<Vec<NodeExecutionUpdate>> for UpdateOps {
    fn from(updates: Vec<NodeExecutionUpdate>) -> Self {
        Self(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiance::{Ambiance, Level};
    use crate::core::StepType;
    use crate::plan::{Node, PlanNode};
    use pretty_assertions::assert_eq;

    fn record() -> NodeExecution {
        let node = Node::from(PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN")));
        let ambiance = Ambiance::new("plan", "exec").clone_for_child(Level::new("ne-1", "uuid1"));
        NodeExecution::queued("ne-1", ambiance, &node)
    }

    #[test]
    fn test_apply_in_order() {
        let mut ne = record();
        let ops = UpdateOps::new()
            .set(NodeExecutionUpdate::Mode(ExecutionMode::Task))
            .set(NodeExecutionUpdate::RetryIds(vec!["a".into()]))
            .set(NodeExecutionUpdate::AppendInterrupt(InterruptEffect::retry("i1", "a", 1)))
            .set(NodeExecutionUpdate::AppendInterrupt(InterruptEffect::retry("i2", "b", 2)))
            .set(NodeExecutionUpdate::EndTs(42));

        ops.apply(&mut ne);

        assert_eq!(ne.mode, ExecutionMode::Task);
        assert_eq!(ne.retry_ids, vec!["a".to_string()]);
        assert_eq!(ne.interrupt_history.len(), 2);
        assert_eq!(ne.interrupt_history[1].interrupt_id, "i2");
        assert_eq!(ne.end_ts, Some(42));
    }

    #[test]
    fn test_empty_ops() {
        assert!(UpdateOps::new().is_empty());
        assert!(!UpdateOps::from(vec![NodeExecutionUpdate::OldRetry(true)]).is_empty());
    }
}
