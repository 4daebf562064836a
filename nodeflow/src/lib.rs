//! # Nodeflow
//!
//! A pipeline node execution engine.
//!
//! Nodeflow drives each node of a plan from QUEUED to a final status:
//!
//! - **Guarded transitions**: every status change is a compare-and-set against
//!   an allowed-prior set, so interrupts and late completions never clobber
//!   each other
//! - **Advisers and handlers**: a finished node is advised (next step, retry,
//!   intervention wait, mark success, end) and the advice is carried out
//! - **Child joins**: parents wait on their children through a wait-notify join
//! - **Retry replay**: a retried plan replays finished nodes of the prior run,
//!   cloning their outputs and copying their retry lineages
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nodeflow::prelude::*;
//!
//! let engine = Engine::builder(orchestration)
//!     .with_steps(StepRegistry::new().with_step("SHELL", Arc::new(ShellStep)))
//!     .build()?;
//!
//! engine.start_plan(&Ambiance::new("plan-1", "exec-1")).await?;
//! engine.wait_idle().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod advise;
pub mod ambiance;
pub mod config;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod execution;
pub mod interrupts;
pub mod notify;
pub mod observability;
pub mod plan;
pub mod retry;
pub mod runtime;
pub mod services;
pub mod steps;
pub mod store;
pub mod strategy;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::advise::{Adviser, AdviserRegistry, AdviseHandler, AdviseHandlerFactory, AdvisingEvent};
    pub use crate::ambiance::{Ambiance, Level};
    pub use crate::config::{EngineConfig, LogConfig};
    pub use crate::core::{AdviseType, AdviserType, ExecutionMode, InterruptType, Status, StatusSet, StepType};
    pub use crate::engine::{Engine, EngineBuilder};
    pub use crate::errors::EngineError;
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::execution::{
        AdviserResponse, ExecutableResponse, NodeExecution, NodeRunMetadata, ResponseData, ResponseMap, StepResponse,
    };
    pub use crate::interrupts::{Interrupt, InterruptOutcome};
    pub use crate::plan::{AdviserObtainment, Node, Plan, PlanNode};
    pub use crate::retry::build_replay_map;
    pub use crate::services::{NodeExecutionService, OrchestrationEngine, PlanService, WaitNotifyEngine};
    pub use crate::steps::{Step, StepOutcome, StepRegistry};
    pub use crate::strategy::{NodeExecutionStrategy, NodeRunner};
    pub use crate::utils::generate_id;
}
