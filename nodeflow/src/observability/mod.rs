//! Observability utilities.

mod logging;
mod tracing;

pub use self::logging::init_tracing;
pub use self::tracing::NodeSpanAttributes;
