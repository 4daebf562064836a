//! In-memory per-step detail blobs.

use crate::errors::EngineError;
use crate::services::GraphStepDetailsService;
use async_trait::async_trait;
use dashmap::DashMap;

/// A detail blob attached to a node execution.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDetail {
    /// Plan execution the blob belongs to.
    pub plan_execution_id: String,
    /// Detail name.
    pub name: String,
    /// Detail payload.
    pub value: serde_json::Value,
}

/// A [`GraphStepDetailsService`] keyed by node execution id.
#[derive(Debug, Default)]
pub struct InMemoryStepDetailsStore {
    details: DashMap<String, Vec<StepDetail>>,
}

impl InMemoryStepDetailsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a detail to `node_execution_id`.
    pub fn add(&self, node_execution_id: &str, detail: StepDetail) {
        self.details
            .entry(node_execution_id.to_string())
            .or_default()
            .push(detail);
    }

    /// Details attached to `node_execution_id`.
    #[must_use]
    pub fn details_for(&self, node_execution_id: &str) -> Vec<StepDetail> {
        self.details
            .get(node_execution_id)
            .map(|d| d.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GraphStepDetailsService for InMemoryStepDetailsStore {
    async fn copy_step_details_for_retry(
        &self,
        old_node_execution_id: &str,
        new_plan_execution_id: &str,
        new_node_execution_id: &str,
    ) -> Result<(), EngineError> {
        let copies: Vec<StepDetail> = self
            .details_for(old_node_execution_id)
            .into_iter()
            .map(|detail| StepDetail {
                plan_execution_id: new_plan_execution_id.to_string(),
                ..detail
            })
            .collect();
        if !copies.is_empty() {
            self.details
                .entry(new_node_execution_id.to_string())
                .or_default()
                .extend(copies);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_copy_step_details_for_retry() {
        let store = InMemoryStepDetailsStore::new();
        store.add(
            "old",
            StepDetail {
                plan_execution_id: "e1".into(),
                name: "console".into(),
                value: json!("log line"),
            },
        );

        store.copy_step_details_for_retry("old", "e2", "new").await.unwrap();

        let copied = store.details_for("new");
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].plan_execution_id, "e2");
        assert_eq!(store.details_for("old")[0].plan_execution_id, "e1");
    }
}
