//! Selecting which nodes of a prior run replay in a retried run.

use crate::execution::NodeExecution;
use std::collections::{HashMap, HashSet};

/// Builds the replay map for [`Plan::transform_for_retry`](crate::plan::Plan::transform_for_retry).
///
/// Maps plan node uuid to the node execution of `prior` that should be
/// replayed. Old retries, unfinished executions and everything at or below a
/// node in `rerun_node_ids` are left out so they run fresh.
#[must_use]
pub fn build_replay_map(prior: &[NodeExecution], rerun_node_ids: &HashSet<String>) -> HashMap<String, String> {
    prior
        .iter()
        .filter(|ne| !ne.old_retry && ne.status.is_final())
        .filter(|ne| {
            !ne.ambiance
                .levels
                .iter()
                .any(|level| rerun_node_ids.contains(&level.setup_id))
        })
        .map(|ne| (ne.node_id.clone(), ne.uuid.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiance::{Ambiance, Level};
    use crate::core::{Status, StepType};
    use crate::plan::{Node, PlanNode};

    fn record(id: &str, path: &[&str], status: Status) -> NodeExecution {
        let setup_id = path.last().copied().unwrap_or_default();
        let ambiance = path.iter().enumerate().fold(Ambiance::new("plan", "exec-1"), |amb, (i, setup)| {
            let runtime_id = if i + 1 == path.len() { id.to_string() } else { format!("rt-{setup}") };
            amb.clone_for_child(Level::new(runtime_id, *setup))
        });
        let node = Node::from(PlanNode::new(setup_id, setup_id, StepType::step("TEST_STEP_PLAN")));
        let mut ne = NodeExecution::queued(id, ambiance, &node);
        ne.status = status;
        ne
    }

    #[test]
    fn test_replay_map_excludes_rerun_subtree() {
        let prior = vec![
            record("ne-stage1", &["pipeline", "stage1"], Status::Succeeded),
            record("ne-step1", &["pipeline", "stage1", "step1"], Status::Succeeded),
            record("ne-stage2", &["pipeline", "stage2"], Status::Failed),
            record("ne-step2", &["pipeline", "stage2", "step2"], Status::Failed),
        ];
        let rerun = HashSet::from(["stage2".to_string()]);

        let replay = build_replay_map(&prior, &rerun);

        assert_eq!(replay.len(), 2);
        assert_eq!(replay.get("stage1").map(String::as_str), Some("ne-stage1"));
        assert_eq!(replay.get("step1").map(String::as_str), Some("ne-step1"));
        assert!(!replay.contains_key("step2"));
    }

    #[test]
    fn test_replay_map_skips_old_retries_and_unfinished() {
        let mut old = record("ne-old", &["pipeline", "step"], Status::Failed);
        old.old_retry = true;
        let prior = vec![
            old,
            record("ne-new", &["pipeline", "step"], Status::Succeeded),
            record("ne-running", &["pipeline", "other"], Status::Running),
        ];

        let replay = build_replay_map(&prior, &HashSet::new());

        assert_eq!(replay.get("step").map(String::as_str), Some("ne-new"));
        assert!(!replay.contains_key("other"));
    }
}
