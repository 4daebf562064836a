//! Core domain enums for nodeflow.
//!
//! This module contains the tags the engine dispatches on:
//! - Node status and the guard sets for status transitions
//! - Execution modes and step types
//! - Advise, adviser and interrupt kinds

mod kinds;
mod status;

pub use kinds::{
    AdviseType, AdviserType, ExecutionMode, InterruptType, StepCategory, StepType,
    PIPELINE_STAGE_STEP_TYPE,
};
pub use status::{Status, StatusSet};
