//! Adviser dispatch.
//!
//! A finished node is advised in one of two ways, fixed by its plan node:
//! synchronously through the [`AdviserRegistry`] and [`AdviseHandlerFactory`],
//! or through the queue served by an [`AdvisingWorker`] when
//! `use_adviser_obtainments` is set.

mod adviser;
mod handlers;
mod queue;

pub use adviser::{Adviser, AdviserRegistry, AdvisingEvent, NextStepAdviser};
pub use handlers::{
    AdviseHandler, AdviseHandlerFactory, EndPlanHandler, InterventionWaitHandler, MarkSuccessHandler,
    NextStepHandler, RetryHandler,
};
pub use queue::{AdvisingRequest, AdvisingWorker, QueuedAdviseHelper};
