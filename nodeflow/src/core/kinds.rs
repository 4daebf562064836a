//! Execution modes, step types and the tagged kinds used for dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution shape of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    /// Completes inline.
    #[default]
    Sync,
    /// Completes through an in-process callback.
    Async,
    /// Completes when a remote task reports back.
    Task,
    /// Runs a single child node.
    Child,
    /// Runs several child nodes and joins on them.
    Children,
}

impl ExecutionMode {
    /// Leaf modes run step work themselves instead of spawning child nodes.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Sync | Self::Async | Self::Task)
    }

    /// Modes whose completion arrives out of band.
    #[must_use]
    pub fn is_out_of_band(&self) -> bool {
        matches!(self, Self::Async | Self::Task)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => write!(f, "SYNC"),
            Self::Async => write!(f, "ASYNC"),
            Self::Task => write!(f, "TASK"),
            Self::Child => write!(f, "CHILD"),
            Self::Children => write!(f, "CHILDREN"),
        }
    }
}

/// Broad category of a step type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepCategory {
    /// The whole pipeline.
    Pipeline,
    /// A container of stages.
    Stages,
    /// A single stage.
    Stage,
    /// A group of steps.
    StepGroup,
    /// A looping/matrix strategy node.
    Strategy,
    /// A parallel fork.
    Fork,
    /// A leaf step.
    #[default]
    Step,
}

/// Step type name of a stage that runs a whole child pipeline.
pub const PIPELINE_STAGE_STEP_TYPE: &str = "PIPELINE_STAGE";

/// Identifies the executable behaviour of a plan node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepType {
    /// Registry key of the step behaviour.
    #[serde(rename = "type")]
    pub type_name: String,
    /// The step category.
    pub category: StepCategory,
}

impl StepType {
    /// Creates a new step type.
    #[must_use]
    pub fn new(type_name: impl Into<String>, category: StepCategory) -> Self {
        Self {
            type_name: type_name.into(),
            category,
        }
    }

    /// Creates a leaf step type.
    #[must_use]
    pub fn step(type_name: impl Into<String>) -> Self {
        Self::new(type_name, StepCategory::Step)
    }

    /// Returns true for a stage running a chained pipeline.
    #[must_use]
    pub fn is_pipeline_stage(&self) -> bool {
        self.type_name == PIPELINE_STAGE_STEP_TYPE
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)
    }
}

/// The kind of advice produced for a finished node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdviseType {
    /// Advance to the next node.
    NextStep,
    /// End the plan.
    EndPlan,
    /// Run the node again.
    Retry,
    /// Wait for a manual intervention.
    InterventionWait,
    /// Mark the node successful and advance.
    MarkSuccess,
}

impl fmt::Display for AdviseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NextStep => write!(f, "NEXT_STEP"),
            Self::EndPlan => write!(f, "END_PLAN"),
            Self::Retry => write!(f, "RETRY"),
            Self::InterventionWait => write!(f, "INTERVENTION_WAIT"),
            Self::MarkSuccess => write!(f, "MARK_SUCCESS"),
        }
    }
}

/// The kind of adviser a plan node declares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdviserType {
    /// Always advances to a configured next node.
    NextStep,
    /// Acts when the node succeeded.
    OnSuccess,
    /// Acts when the node failed.
    OnFail,
    /// Retries a failed node.
    Retry,
    /// Asks for a manual intervention.
    ManualIntervention,
    /// Any adviser registered by name.
    Custom(String),
}

impl fmt::Display for AdviserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NextStep => write!(f, "NEXT_STEP"),
            Self::OnSuccess => write!(f, "ON_SUCCESS"),
            Self::OnFail => write!(f, "ON_FAIL"),
            Self::Retry => write!(f, "RETRY"),
            Self::ManualIntervention => write!(f, "MANUAL_INTERVENTION"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// The kind of an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptType {
    /// Re-run a failed node.
    Retry,
    /// Abort a running node.
    Abort,
    /// Mark a failed node as successful.
    MarkSuccess,
}

impl fmt::Display for InterruptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "RETRY"),
            Self::Abort => write!(f, "ABORT"),
            Self::MarkSuccess => write!(f, "MARK_SUCCESS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_shapes() {
        assert!(ExecutionMode::Sync.is_leaf());
        assert!(ExecutionMode::Task.is_leaf());
        assert!(!ExecutionMode::Children.is_leaf());
        assert!(ExecutionMode::Async.is_out_of_band());
        assert!(!ExecutionMode::Sync.is_out_of_band());
    }

    #[test]
    fn test_step_type_serialize() {
        let step_type = StepType::step("TEST_STEP_PLAN");
        let json = serde_json::to_value(&step_type).unwrap();

        assert_eq!(json["type"], "TEST_STEP_PLAN");
        assert_eq!(json["category"], "STEP");
    }

    #[test]
    fn test_pipeline_stage_detection() {
        assert!(StepType::new(PIPELINE_STAGE_STEP_TYPE, StepCategory::Stage).is_pipeline_stage());
        assert!(!StepType::step("SHELL").is_pipeline_stage());
    }

    #[test]
    fn test_adviser_type_display() {
        assert_eq!(AdviserType::OnFail.to_string(), "ON_FAIL");
        assert_eq!(AdviserType::Custom("MY_ADVISER".into()).to_string(), "MY_ADVISER");
    }
}
