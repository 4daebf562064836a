//! Error types for the nodeflow engine.
//!
//! Guarded status updates that lose their race are not errors and never
//! surface here; they come back as `Ok(None)` from the store.

use crate::core::{AdviseType, AdviserType, Status};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A retry id had no entry in the old-to-new retry id map.
    #[error("{0}")]
    MissingRetryMapping(#[from] MissingRetryMappingError),

    /// No node execution exists under the given id.
    #[error("Node execution not found: {id}")]
    NodeExecutionNotFound {
        /// The node execution id.
        id: String,
    },

    /// No plan is registered under the given id.
    #[error("Plan not found: {plan_id}")]
    PlanNotFound {
        /// The plan id.
        plan_id: String,
    },

    /// The plan does not contain the requested node.
    #[error("Plan node '{node_id}' not found in plan '{plan_id}'")]
    PlanNodeNotFound {
        /// The plan id.
        plan_id: String,
        /// The plan node uuid.
        node_id: String,
    },

    /// No advise handler is registered for an advise type.
    #[error("No advise handler registered for {0}")]
    NoAdviseHandler(AdviseType),

    /// No step behaviour is registered for a step type.
    #[error("No step registered for step type '{step_type}'")]
    StepNotRegistered {
        /// The step type name.
        step_type: String,
    },

    /// No adviser is registered for an adviser type.
    #[error("No adviser registered for {0}")]
    NoAdviser(AdviserType),

    /// The ambiance carried no levels while a node was expected to be active.
    #[error("Ambiance for plan execution '{plan_execution_id}' has no levels")]
    EmptyAmbiance {
        /// The plan execution id.
        plan_execution_id: String,
    },

    /// A guarded update was requested with no allowed prior statuses.
    #[error("Guarded update of '{node_execution_id}' to {target} has an empty allowed-prior set")]
    EmptyStatusGuard {
        /// The node execution id.
        node_execution_id: String,
        /// The requested status.
        target: Status,
    },

    /// The asynchronous advising queue has shut down.
    #[error("Advising queue closed")]
    AdvisingQueueClosed,

    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A persistence collaborator failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Creates a node execution not found error.
    #[must_use]
    pub fn node_execution_not_found(id: impl Into<String>) -> Self {
        Self::NodeExecutionNotFound { id: id.into() }
    }

    /// Creates a plan node not found error.
    #[must_use]
    pub fn plan_node_not_found(plan_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self::PlanNodeNotFound {
            plan_id: plan_id.into(),
            node_id: node_id.into(),
        }
    }

    /// Returns true for errors caused by records that do not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeExecutionNotFound { .. } | Self::PlanNotFound { .. } | Self::PlanNodeNotFound { .. }
        )
    }
}

/// Diagnostic metadata attached to data-integrity errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "RETRY-001-MISSING_MAPPING").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a JSON representation.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }
        serde_json::Value::Object(map)
    }
}

/// Raised when a retry id that must be remapped has no entry in the map.
#[derive(Debug, Clone, Error)]
#[error("No new retry id mapped for original retry id '{retry_id}'")]
pub struct MissingRetryMappingError {
    /// The retry id without a mapping.
    pub retry_id: String,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl MissingRetryMappingError {
    /// Creates a new missing retry mapping error.
    #[must_use]
    pub fn new(retry_id: impl Into<String>) -> Self {
        let retry_id = retry_id.into();
        let info = ErrorInfo::new(
            "RETRY-001-MISSING_MAPPING",
            format!("Retry id '{retry_id}' was not copied into the new execution"),
        )
        .with_fix_hint("Every prior retry attempt must be copied before its id is remapped.")
        .with_context_entry("retry_id", retry_id.clone());

        Self {
            retry_id,
            error_info: info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_retry_mapping_error() {
        let err = MissingRetryMappingError::new("r-1");

        assert!(err.to_string().contains("'r-1'"));
        assert_eq!(err.error_info.code, "RETRY-001-MISSING_MAPPING");
        assert_eq!(err.error_info.context.get("retry_id"), Some(&"r-1".to_string()));
    }

    #[test]
    fn test_engine_error_from_missing_mapping() {
        let err: EngineError = MissingRetryMappingError::new("r-2").into();
        assert!(matches!(err, EngineError::MissingRetryMapping(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_errors() {
        assert!(EngineError::node_execution_not_found("ne").is_not_found());
        assert!(EngineError::plan_node_not_found("plan", "node").is_not_found());
        assert!(!EngineError::AdvisingQueueClosed.is_not_found());
    }

    #[test]
    fn test_error_info_to_json() {
        let info = ErrorInfo::new("X-1", "summary").with_fix_hint("hint");
        let json = info.to_json();

        assert_eq!(json["code"], "X-1");
        assert_eq!(json["fix_hint"], "hint");
        assert!(json.get("context").is_none());
    }
}
