//! Step behaviours and their registry.
//!
//! A plan node names its behaviour through its [`StepType`]; the registry maps
//! the type name to a [`Step`] once at startup.

use crate::ambiance::Ambiance;
use crate::core::{Status, StepType};
use crate::errors::EngineError;
use crate::execution::{ExecutableResponse, ResponseData, ResponseMap, StepResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// What a step handed back when started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step finished inline.
    Completed(StepResponse),
    /// The step finishes later; the response says how.
    Suspended(ExecutableResponse),
}

/// The executable behaviour behind a step type.
#[async_trait]
pub trait Step: Send + Sync {
    /// Starts the step for the node active in `ambiance`.
    ///
    /// An `Err` fails the node; it is never propagated further.
    async fn execute(&self, ambiance: &Ambiance, parameters: &serde_json::Value) -> anyhow::Result<StepOutcome>;

    /// Produces the final response once suspended work reported back.
    ///
    /// The default fails on any error entry or failed child and succeeds otherwise.
    async fn handle_async_response(
        &self,
        _ambiance: &Ambiance,
        _parameters: &serde_json::Value,
        responses: &ResponseMap,
    ) -> anyhow::Result<StepResponse> {
        Ok(summarize_responses(responses))
    }
}

/// Folds child and task results into one response.
#[must_use]
pub fn summarize_responses(responses: &ResponseMap) -> StepResponse {
    let mut failures: Vec<String> = responses
        .iter()
        .filter_map(|(id, data)| match data {
            ResponseData::Error { message } => Some(format!("{id}: {message}")),
            ResponseData::Notify(child) if child.status.is_broken() || child.status == Status::Aborted => {
                Some(format!("{} ended {}", child.identifier, child.status))
            }
            _ => None,
        })
        .collect();
    if failures.is_empty() {
        return StepResponse::succeeded();
    }
    failures.sort();
    StepResponse::failed(failures.join("; "))
}

/// Step behaviours keyed by step type name.
#[derive(Default, Clone)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `step` under `type_name`.
    #[must_use]
    pub fn with_step(mut self, type_name: impl Into<String>, step: Arc<dyn Step>) -> Self {
        self.steps.insert(type_name.into(), step);
        self
    }

    /// Registers `step` under `type_name`.
    pub fn register(&mut self, type_name: impl Into<String>, step: Arc<dyn Step>) {
        self.steps.insert(type_name.into(), step);
    }

    /// Looks up the behaviour for `step_type`.
    pub fn get(&self, step_type: &StepType) -> Result<Arc<dyn Step>, EngineError> {
        self.steps
            .get(&step_type.type_name)
            .cloned()
            .ok_or_else(|| EngineError::StepNotRegistered {
                step_type: step_type.type_name.clone(),
            })
    }

    /// Registered type names.
    #[must_use]
    pub fn step_types(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.step_types())
            .finish()
    }
}
