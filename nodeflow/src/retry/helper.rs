//! Copies retried lineages into a new execution generation.

use crate::errors::{EngineError, MissingRetryMappingError};
use crate::execution::{InterruptEffect, NodeExecution, NodeExecutionQuery, NodeExecutionUpdate, UpdateOps};
use crate::services::{GraphStepDetailsService, NodeExecutionService};
use crate::utils::{generate_id, now_millis};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Maps each retry id to its copy in the new generation.
///
/// Fails with [`MissingRetryMappingError`] on the first id without an entry.
/// The output keeps the order and length of `retry_ids`.
pub fn get_new_retry_ids_from_original_retry_ids(
    retry_ids: &[String],
    retry_ids_map: &HashMap<String, String>,
) -> Result<Vec<String>, MissingRetryMappingError> {
    retry_ids
        .iter()
        .map(|id| {
            retry_ids_map
                .get(id)
                .cloned()
                .ok_or_else(|| MissingRetryMappingError::new(id.clone()))
        })
        .collect()
}

/// Rewrites the retry id of every RETRY effect found in `retry_ids_map`.
///
/// Effects of other types, and retry ids the map does not know, pass through
/// unchanged. Order and length are preserved.
#[must_use]
pub fn get_updated_interrupt_history(
    history: &[InterruptEffect],
    retry_ids_map: &HashMap<String, String>,
) -> Vec<InterruptEffect> {
    history
        .iter()
        .map(|effect| match effect.retry_id().and_then(|id| retry_ids_map.get(id)) {
            Some(new_id) => effect.with_retry_id(new_id.clone()),
            None => effect.clone(),
        })
        .collect()
}

/// Carries retry lineages and their step details across execution generations.
#[derive(Clone)]
pub struct RetryHelper {
    node_executions: Arc<dyn NodeExecutionService>,
    step_details: Arc<dyn GraphStepDetailsService>,
}

impl RetryHelper {
    /// Creates a helper.
    #[must_use]
    pub fn new(
        node_executions: Arc<dyn NodeExecutionService>,
        step_details: Arc<dyn GraphStepDetailsService>,
    ) -> Self {
        Self {
            node_executions,
            step_details,
        }
    }

    /// Copies every earlier attempt listed in `retry_ids` under the plan
    /// execution of `node_execution`, then points `node_execution` at the copies.
    ///
    /// Creates one record per id in a single batch, each with
    /// `original_node_execution_id` set to the attempt it copies and carrying
    /// that attempt's step details, and updates `node_execution` once with the
    /// remapped retry ids and interrupt history.
    pub async fn copy_node_executions_for_retried_nodes(
        &self,
        node_execution: &NodeExecution,
        retry_ids: &[String],
    ) -> Result<Vec<NodeExecution>, EngineError> {
        if retry_ids.is_empty() {
            return Ok(Vec::new());
        }

        let originals = self
            .node_executions
            .get_all(NodeExecutionQuery::by_uuids(retry_ids.to_vec()).with_page(0, retry_ids.len()))
            .await?;

        let retry_ids_map: HashMap<String, String> = originals
            .iter()
            .map(|original| (original.uuid.clone(), generate_id()))
            .collect();

        // Remap before writing anything so a missing attempt leaves the store untouched.
        let new_retry_ids = get_new_retry_ids_from_original_retry_ids(retry_ids, &retry_ids_map)?;
        let new_history = get_updated_interrupt_history(&node_execution.interrupt_history, &retry_ids_map);

        let now = now_millis();
        let mut copies = Vec::with_capacity(originals.len());
        for original in originals {
            let new_uuid = retry_ids_map
                .get(&original.uuid)
                .cloned()
                .ok_or_else(|| MissingRetryMappingError::new(original.uuid.clone()))?;
            copies.push(NodeExecution {
                ambiance: node_execution
                    .ambiance
                    .with_plan_execution_id(node_execution.plan_execution_id(), new_uuid.clone()),
                uuid: new_uuid,
                retry_ids: get_new_retry_ids_from_original_retry_ids(&original.retry_ids, &retry_ids_map)?,
                interrupt_history: get_updated_interrupt_history(&original.interrupt_history, &retry_ids_map),
                original_node_execution_id: Some(original.uuid.clone()),
                old_retry: true,
                notify_id: None,
                parent_id: node_execution.parent_id.clone(),
                previous_id: node_execution.previous_id.clone(),
                last_updated_at: now,
                ..original
            });
        }

        debug!(
            node_execution_id = %node_execution.uuid,
            copies = copies.len(),
            "Copying retried node executions"
        );
        let saved = self.node_executions.save_all(copies).await?;
        for copy in &saved {
            if let Some(original_id) = &copy.original_node_execution_id {
                self.copy_step_details_for_retry(original_id, node_execution.plan_execution_id(), &copy.uuid)
                    .await?;
            }
        }

        self.node_executions
            .update_v2(
                &node_execution.uuid,
                UpdateOps::new()
                    .set(NodeExecutionUpdate::RetryIds(new_retry_ids))
                    .set(NodeExecutionUpdate::InterruptHistory(new_history)),
            )
            .await?;

        info!(
            node_execution_id = %node_execution.uuid,
            plan_execution_id = %node_execution.plan_execution_id(),
            copies = saved.len(),
            "Copied retried lineage"
        );
        Ok(saved)
    }

    /// Copies the step details of `old_node_execution_id` onto a new execution.
    pub async fn copy_step_details_for_retry(
        &self,
        old_node_execution_id: &str,
        new_plan_execution_id: &str,
        new_node_execution_id: &str,
    ) -> Result<(), EngineError> {
        self.step_details
            .copy_step_details_for_retry(old_node_execution_id, new_plan_execution_id, new_node_execution_id)
            .await
    }
}

impl std::fmt::Debug for RetryHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryHelper").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InterruptType;
    use crate::execution::InterruptConfig;
    use crate::services::{MockGraphStepDetailsService, MockNodeExecutionService};
    use crate::testing::{plan_node, AmbianceFixture};
    use crate::plan::Node;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn record(id: &str, exec: &str) -> NodeExecution {
        let node = Node::from(plan_node("uuid1", "test"));
        NodeExecution::queued(id, AmbianceFixture::new("plan", exec).node(id, "uuid1"), &node)
    }

    #[test]
    fn test_new_retry_ids_keep_order_and_length() {
        let retry_map = map(&[("a", "a2"), ("b", "b2"), ("c", "c2"), ("unused", "x")]);
        let result = get_new_retry_ids_from_original_retry_ids(&ids(&["c", "a", "b"]), &retry_map).unwrap();
        assert_eq!(result, ids(&["c2", "a2", "b2"]));
    }

    #[test]
    fn test_new_retry_ids_reject_missing_mapping() {
        let err = get_new_retry_ids_from_original_retry_ids(&ids(&["a", "zz"]), &map(&[("a", "a2")])).unwrap_err();
        assert_eq!(err.retry_id, "zz");
    }

    #[test]
    fn test_new_retry_ids_empty() {
        assert!(get_new_retry_ids_from_original_retry_ids(&[], &HashMap::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_updated_interrupt_history_rewrites_only_known_retry_ids() {
        let history = vec![
            InterruptEffect::retry("i1", "a", 1),
            InterruptEffect::new(
                "i2",
                InterruptType::Abort,
                2,
                InterruptConfig::Issued {
                    issued_by: "user".into(),
                },
            ),
            InterruptEffect::retry("i3", "unknown", 3),
            InterruptEffect::new("i4", InterruptType::MarkSuccess, 4, InterruptConfig::Empty),
        ];

        let updated = get_updated_interrupt_history(&history, &map(&[("a", "a2")]));

        assert_eq!(updated.len(), history.len());
        assert_eq!(updated[0].retry_id(), Some("a2"));
        assert_eq!(updated[0].interrupt_id, "i1");
        assert_eq!(updated[0].took_effect_at, 1);
        assert_eq!(updated[1], history[1]);
        assert_eq!(updated[2], history[2]);
        assert_eq!(updated[3], history[3]);
    }

    #[tokio::test]
    async fn test_copy_creates_one_copy_per_retry_id_and_updates_once() {
        let mut current = record("current", "exec-2");
        current.interrupt_history = vec![InterruptEffect::retry("i1", "r2", 5)];
        let prior = vec![record("r1", "exec-1"), {
            let mut r2 = record("r2", "exec-1");
            r2.retry_ids = ids(&["r1"]);
            r2
        }];

        let mut store = MockNodeExecutionService::new();
        let returned = prior.clone();
        store
            .expect_get_all()
            .times(1)
            .returning(move |_| Ok(returned.clone()));
        store
            .expect_save_all()
            .times(1)
            .withf(|copies| {
                let originals: HashSet<_> = copies
                    .iter()
                    .filter_map(|c| c.original_node_execution_id.as_deref())
                    .collect();
                copies.len() == 2
                    && originals == HashSet::from(["r1", "r2"])
                    && copies.iter().all(|c| c.old_retry && c.plan_execution_id() == "exec-2")
            })
            .returning(Ok);
        store
            .expect_update_v2()
            .with(eq("current"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut details = MockGraphStepDetailsService::new();
        details
            .expect_copy_step_details_for_retry()
            .withf(|old, exec, new| (old == "r1" || old == "r2") && exec == "exec-2" && new != old)
            .times(2)
            .returning(|_, _, _| Ok(()));

        let helper = RetryHelper::new(Arc::new(store), Arc::new(details));
        let copies = helper
            .copy_node_executions_for_retried_nodes(&current, &ids(&["r1", "r2"]))
            .await
            .unwrap();

        assert_eq!(copies.len(), 2);
        let r1_copy = copies
            .iter()
            .find(|c| c.original_node_execution_id.as_deref() == Some("r1"))
            .unwrap();
        let r2_copy = copies
            .iter()
            .find(|c| c.original_node_execution_id.as_deref() == Some("r2"))
            .unwrap();
        assert_eq!(r2_copy.retry_ids, vec![r1_copy.uuid.clone()]);
        assert_eq!(r1_copy.ambiance.current_runtime_id(), Some(r1_copy.uuid.as_str()));
    }

    #[tokio::test]
    async fn test_copy_with_missing_attempt_writes_nothing() {
        let mut store = MockNodeExecutionService::new();
        store
            .expect_get_all()
            .times(1)
            .returning(|_| Ok(vec![record("r1", "exec-1")]));
        store.expect_save_all().times(0);
        store.expect_update_v2().times(0);

        let helper = RetryHelper::new(Arc::new(store), Arc::new(MockGraphStepDetailsService::new()));
        let err = helper
            .copy_node_executions_for_retried_nodes(&record("current", "exec-2"), &ids(&["r1", "gone"]))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::MissingRetryMapping(_)));
    }

    #[tokio::test]
    async fn test_copy_with_no_retry_ids_is_noop() {
        let mut store = MockNodeExecutionService::new();
        store.expect_get_all().times(0);
        let helper = RetryHelper::new(Arc::new(store), Arc::new(MockGraphStepDetailsService::new()));

        let copies = helper
            .copy_node_executions_for_retried_nodes(&record("current", "exec-2"), &[])
            .await
            .unwrap();
        assert!(copies.is_empty());
    }

    #[tokio::test]
    async fn test_copy_step_details_delegates() {
        let mut details = MockGraphStepDetailsService::new();
        details
            .expect_copy_step_details_for_retry()
            .with(eq("old"), eq("exec-2"), eq("new"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let helper = RetryHelper::new(Arc::new(MockNodeExecutionService::new()), Arc::new(details));
        helper.copy_step_details_for_retry("old", "exec-2", "new").await.unwrap();
    }
}
