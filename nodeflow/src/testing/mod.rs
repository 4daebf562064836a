//! Testing utilities for node execution.
//!
//! This module provides:
//! - Recording collaborators and scripted steps
//! - Assertions on node execution records
//! - Ambiance fixtures and an in-memory engine harness

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_copied_from, assert_finished, assert_status};
pub use fixtures::{identity_node, plan_node, AmbianceFixture, TestHarness, TEST_STEP_TYPE};
pub use mocks::{
    GuardedUpdate, QueuedAdvice, RecordingAdviseHelper, RecordingNodeExecutionService, RecordingOrchestrationEngine,
    RecordingWaitNotifyEngine, ScriptedStep,
};
