//! Interrupt effects recorded on node executions.

use crate::core::InterruptType;
use serde::{Deserialize, Serialize};

/// Payload of an interrupt effect, tagged by shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum InterruptConfig {
    /// A retry; `retry_id` is the node execution created because of it.
    Retry {
        /// Id of the retry attempt.
        retry_id: String,
    },
    /// An interrupt issued by a user or system without extra payload.
    Issued {
        /// Who issued it.
        issued_by: String,
    },
    /// No payload.
    #[default]
    Empty,
}

/// One interrupt that took effect on a node execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptEffect {
    /// Interrupt id.
    pub interrupt_id: String,
    /// Interrupt kind.
    pub interrupt_type: InterruptType,
    /// Ordering key of the effect (epoch millis).
    pub took_effect_at: i64,
    /// Type specific payload.
    #[serde(default)]
    pub interrupt_config: InterruptConfig,
}

impl InterruptEffect {
    /// Creates an effect.
    #[must_use]
    pub fn new(
        interrupt_id: impl Into<String>,
        interrupt_type: InterruptType,
        took_effect_at: i64,
        interrupt_config: InterruptConfig,
    ) -> Self {
        Self {
            interrupt_id: interrupt_id.into(),
            interrupt_type,
            took_effect_at,
            interrupt_config,
        }
    }

    /// Creates a RETRY effect pointing at `retry_id`.
    #[must_use]
    pub fn retry(interrupt_id: impl Into<String>, retry_id: impl Into<String>, took_effect_at: i64) -> Self {
        Self::new(
            interrupt_id,
            InterruptType::Retry,
            took_effect_at,
            InterruptConfig::Retry {
                retry_id: retry_id.into(),
            },
        )
    }

    /// The retry id carried by a RETRY config.
    #[must_use]
    pub fn retry_id(&self) -> Option<&str> {
        match &self.interrupt_config {
            InterruptConfig::Retry { retry_id } => Some(retry_id),
            _ => None,
        }
    }

    /// A copy whose retry id is replaced; non-retry configs are returned untouched.
    #[must_use]
    pub fn with_retry_id(&self, new_retry_id: impl Into<String>) -> Self {
        let mut effect = self.clone();
        if let InterruptConfig::Retry { retry_id } = &mut effect.interrupt_config {
            *retry_id = new_retry_id.into();
        }
        effect
    }
}
