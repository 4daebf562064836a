//! In-memory implementations of the persistence collaborators.

mod node_executions;
mod outputs;
mod plans;
mod step_details;

pub use node_executions::InMemoryNodeExecutionService;
pub use outputs::InMemoryOutputStore;
pub use plans::InMemoryPlanService;
pub use step_details::{InMemoryStepDetailsStore, StepDetail};
