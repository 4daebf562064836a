//! Execution context passed through every engine call.
//!
//! An [`Ambiance`] is a value: every derivation (`clone_for_child`,
//! `clone_for_finish`, ...) returns a fresh copy and never mutates the
//! receiver, so concurrent strategy calls can share one freely.

mod level;

pub use level::Level;

use crate::core::StepCategory;
use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Setup abstraction key for the account id.
pub const ACCOUNT_ID_KEY: &str = "accountId";
/// Setup abstraction key for the organization id.
pub const ORG_ID_KEY: &str = "orgIdentifier";
/// Setup abstraction key for the project id.
pub const PROJECT_ID_KEY: &str = "projectIdentifier";
/// Setup abstraction key for the triggering user.
pub const USER_ID_KEY: &str = "userId";

/// Per-node execution context: plan identity, level stack and setup abstractions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Ambiance {
    /// The plan being executed.
    pub plan_id: String,
    /// This run of the plan.
    pub plan_execution_id: String,
    /// Nesting stack, the last level is the active node.
    #[serde(default)]
    pub levels: Vec<Level>,
    /// Account/org/project/user context, read-only for the engine.
    #[serde(default)]
    pub setup_abstractions: BTreeMap<String, String>,
}

impl Ambiance {
    /// Creates an ambiance with no levels.
    #[must_use]
    pub fn new(plan_id: impl Into<String>, plan_execution_id: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
            plan_execution_id: plan_execution_id.into(),
            levels: Vec::new(),
            setup_abstractions: BTreeMap::new(),
        }
    }

    /// Adds a setup abstraction.
    #[must_use]
    pub fn with_setup_abstraction(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.setup_abstractions.insert(key.into(), value.into());
        self
    }

    /// Returns the active level, if any.
    #[must_use]
    pub fn current_level(&self) -> Option<&Level> {
        self.levels.last()
    }

    /// Returns the active level, failing on an empty stack.
    pub fn require_current_level(&self) -> Result<&Level, EngineError> {
        self.current_level().ok_or_else(|| EngineError::EmptyAmbiance {
            plan_execution_id: self.plan_execution_id.clone(),
        })
    }

    /// Runtime id of the active node execution.
    #[must_use]
    pub fn current_runtime_id(&self) -> Option<&str> {
        self.current_level().map(|l| l.runtime_id.as_str())
    }

    /// Runtime id of the active node execution, failing on an empty stack.
    pub fn require_runtime_id(&self) -> Result<&str, EngineError> {
        self.require_current_level().map(|l| l.runtime_id.as_str())
    }

    /// Plan node uuid of the active level.
    #[must_use]
    pub fn current_setup_id(&self) -> Option<&str> {
        self.current_level().map(|l| l.setup_id.as_str())
    }

    /// Runtime id of the enclosing node, if the stack is deeper than one.
    #[must_use]
    pub fn parent_runtime_id(&self) -> Option<&str> {
        let len = self.levels.len();
        if len < 2 {
            return None;
        }
        Some(self.levels[len - 2].runtime_id.as_str())
    }

    /// Number of levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// A copy with `level` pushed as the new active node.
    #[must_use]
    pub fn clone_for_child(&self, level: Level) -> Self {
        let mut cloned = self.clone();
        cloned.levels.push(level);
        cloned
    }

    /// A copy with the active level popped.
    #[must_use]
    pub fn clone_for_finish(&self) -> Self {
        let mut cloned = self.clone();
        cloned.levels.pop();
        cloned
    }

    /// A copy with the active level replaced by `level`.
    #[must_use]
    pub fn clone_for_sibling(&self, level: Level) -> Self {
        self.clone_for_finish().clone_for_child(level)
    }

    /// A copy moved into another plan execution, with the active runtime id replaced.
    #[must_use]
    pub fn with_plan_execution_id(&self, plan_execution_id: impl Into<String>, runtime_id: impl Into<String>) -> Self {
        let mut cloned = self.clone();
        cloned.plan_execution_id = plan_execution_id.into();
        if let Some(level) = cloned.levels.last_mut() {
            level.runtime_id = runtime_id.into();
        }
        cloned
    }

    /// The innermost stage level.
    #[must_use]
    pub fn stage_level(&self) -> Option<&Level> {
        self.levels
            .iter()
            .rev()
            .find(|l| l.step_type.as_ref().is_some_and(|t| t.category == StepCategory::Stage))
    }

    /// True when the active level is a retry attempt.
    #[must_use]
    pub fn is_retry(&self) -> bool {
        self.current_level().is_some_and(|l| l.retry_index > 0)
    }

    /// The account id setup abstraction.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        self.setup_abstractions.get(ACCOUNT_ID_KEY).map(String::as_str)
    }

    /// The organization setup abstraction.
    #[must_use]
    pub fn org_identifier(&self) -> Option<&str> {
        self.setup_abstractions.get(ORG_ID_KEY).map(String::as_str)
    }

    /// The project setup abstraction.
    #[must_use]
    pub fn project_identifier(&self) -> Option<&str> {
        self.setup_abstractions.get(PROJECT_ID_KEY).map(String::as_str)
    }

    /// The triggering user setup abstraction.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.setup_abstractions.get(USER_ID_KEY).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepType;

    fn base() -> Ambiance {
        Ambiance::new("plan", "exec")
            .with_setup_abstraction(ACCOUNT_ID_KEY, "acc")
            .clone_for_child(Level::new("rt-pipeline", "pipeline").with_step_type(StepType::new(
                "PIPELINE",
                StepCategory::Pipeline,
            )))
            .clone_for_child(
                Level::new("rt-stage", "stage").with_step_type(StepType::new("DEPLOY", StepCategory::Stage)),
            )
    }

    #[test]
    fn test_current_and_parent_runtime_id() {
        let ambiance = base().clone_for_child(Level::new("rt-step", "step"));

        assert_eq!(ambiance.current_runtime_id(), Some("rt-step"));
        assert_eq!(ambiance.current_setup_id(), Some("step"));
        assert_eq!(ambiance.parent_runtime_id(), Some("rt-stage"));
        assert_eq!(ambiance.depth(), 3);
    }

    #[test]
    fn test_parent_runtime_id_with_single_level() {
        let ambiance = Ambiance::new("p", "e").clone_for_child(Level::new("only", "n"));
        assert_eq!(ambiance.parent_runtime_id(), None);
    }

    #[test]
    fn test_clone_does_not_mutate_source() {
        let ambiance = base();
        let child = ambiance.clone_for_child(Level::new("rt-step", "step"));
        let finished = child.clone_for_finish();

        assert_eq!(ambiance.depth(), 2);
        assert_eq!(child.depth(), 3);
        assert_eq!(finished, ambiance);
    }

    #[test]
    fn test_clone_for_sibling_replaces_top() {
        let ambiance = base().clone_for_child(Level::new("rt-a", "a"));
        let sibling = ambiance.clone_for_sibling(Level::new("rt-b", "b"));

        assert_eq!(sibling.depth(), ambiance.depth());
        assert_eq!(sibling.current_runtime_id(), Some("rt-b"));
        assert_eq!(sibling.parent_runtime_id(), Some("rt-stage"));
    }

    #[test]
    fn test_with_plan_execution_id() {
        let moved = base().with_plan_execution_id("exec-2", "rt-new");

        assert_eq!(moved.plan_execution_id, "exec-2");
        assert_eq!(moved.current_runtime_id(), Some("rt-new"));
        assert_eq!(moved.levels[0].runtime_id, "rt-pipeline");
    }

    #[test]
    fn test_stage_level_and_setup_abstractions() {
        let ambiance = base().clone_for_child(Level::new("rt-step", "step"));

        assert_eq!(ambiance.stage_level().map(|l| l.setup_id.as_str()), Some("stage"));
        assert_eq!(ambiance.account_id(), Some("acc"));
        assert_eq!(ambiance.project_identifier(), None);
    }

    #[test]
    fn test_empty_ambiance_errors() {
        let ambiance = Ambiance::new("p", "e");
        assert!(ambiance.current_runtime_id().is_none());
        assert!(matches!(
            ambiance.require_runtime_id(),
            Err(EngineError::EmptyAmbiance { .. })
        ));
    }

    #[test]
    fn test_is_retry() {
        let ambiance = base().clone_for_child(Level::new("rt", "n").with_retry_index(1));
        assert!(ambiance.is_retry());
        assert!(!base().is_retry());
    }

    #[test]
    fn test_ambiance_serialization() {
        let ambiance = base();
        let json = serde_json::to_string(&ambiance).unwrap();
        let restored: Ambiance = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, ambiance);
        assert!(json.contains("planExecutionId"));
    }
}
