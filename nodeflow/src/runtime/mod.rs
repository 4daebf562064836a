//! Task execution for node work.

mod pool;

pub use pool::{InFlightGuard, WorkerPool};
