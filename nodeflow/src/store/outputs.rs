//! In-memory outcome and sweeping output store.

use crate::ambiance::Ambiance;
use crate::errors::EngineError;
use crate::services::ExecutionOutputService;
use crate::utils::generate_id;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// An [`ExecutionOutputService`] keyed by producing node execution id.
///
/// The engine keeps two instances: one for outcomes, one for sweeping outputs.
#[derive(Debug, Default)]
pub struct InMemoryOutputStore {
    by_node_execution: DashMap<String, BTreeMap<String, serde_json::Value>>,
}

impl InMemoryOutputStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names stored for `node_execution_id`.
    #[must_use]
    pub fn names_for(&self, node_execution_id: &str) -> Vec<String> {
        self.by_node_execution
            .get(node_execution_id)
            .map(|outputs| outputs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionOutputService for InMemoryOutputStore {
    async fn consume(
        &self,
        ambiance: &Ambiance,
        name: &str,
        value: serde_json::Value,
    ) -> Result<String, EngineError> {
        let runtime_id = ambiance.require_runtime_id()?;
        self.by_node_execution
            .entry(runtime_id.to_string())
            .or_default()
            .insert(name.to_string(), value);
        Ok(generate_id())
    }

    async fn resolve(&self, ambiance: &Ambiance, name: &str) -> Result<Option<serde_json::Value>, EngineError> {
        let runtime_id = ambiance.require_runtime_id()?;
        Ok(self
            .by_node_execution
            .get(runtime_id)
            .and_then(|outputs| outputs.get(name).cloned()))
    }

    async fn clone_for_retry_execution(
        &self,
        ambiance: &Ambiance,
        original_node_execution_id: &str,
    ) -> Result<Vec<String>, EngineError> {
        let runtime_id = ambiance.require_runtime_id()?;
        let Some(originals) = self
            .by_node_execution
            .get(original_node_execution_id)
            .map(|outputs| outputs.value().clone())
        else {
            return Ok(Vec::new());
        };

        let mut copied = Vec::with_capacity(originals.len());
        let mut target = self.by_node_execution.entry(runtime_id.to_string()).or_default();
        for (name, value) in originals {
            target.insert(name.clone(), value);
            copied.push(name);
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiance::Level;
    use serde_json::json;

    fn ambiance(exec: &str, runtime_id: &str) -> Ambiance {
        Ambiance::new("plan", exec).clone_for_child(Level::new(runtime_id, "uuid1"))
    }

    #[tokio::test]
    async fn test_consume_and_resolve() {
        let store = InMemoryOutputStore::new();
        let amb = ambiance("e1", "ne-1");
        store.consume(&amb, "output", json!({"x": 1})).await.unwrap();

        assert_eq!(store.resolve(&amb, "output").await.unwrap(), Some(json!({"x": 1})));
        assert_eq!(store.resolve(&amb, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clone_for_retry_execution() {
        let store = InMemoryOutputStore::new();
        let original = ambiance("e1", "ne-1");
        store.consume(&original, "a", json!(1)).await.unwrap();
        store.consume(&original, "b", json!(2)).await.unwrap();

        let retry = ambiance("e2", "ne-2");
        let copied = store.clone_for_retry_execution(&retry, "ne-1").await.unwrap();

        assert_eq!(copied, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.resolve(&retry, "b").await.unwrap(), Some(json!(2)));
        assert_eq!(store.names_for("ne-1").len(), 2);
    }

    #[tokio::test]
    async fn test_clone_without_originals_is_empty() {
        let store = InMemoryOutputStore::new();
        let copied = store
            .clone_for_retry_execution(&ambiance("e2", "ne-2"), "nothing")
            .await
            .unwrap();
        assert!(copied.is_empty());
    }
}
