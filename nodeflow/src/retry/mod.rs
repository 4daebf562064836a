//! Retry propagation.
//!
//! Retries never mutate history: every attempt is its own node execution,
//! and re-running a prior plan execution copies the earlier attempts into the
//! new generation under fresh ids. The id maps built here keep interrupt
//! provenance pointing at the copies.

mod helper;
mod plan_transform;

pub use helper::{get_new_retry_ids_from_original_retry_ids, get_updated_interrupt_history, RetryHelper};
pub use plan_transform::build_replay_map;
