//! In-memory node execution store.

use crate::core::{Status, StatusSet};
use crate::errors::EngineError;
use crate::execution::{NodeExecution, NodeExecutionQuery, NodeExecutionUpdate, NodeField, UpdateOps};
use crate::services::NodeExecutionService;
use crate::utils::now_millis;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// A [`NodeExecutionService`] backed by a `DashMap`.
///
/// Guarded updates check and write the status while holding the entry's
/// shard lock, so two racing transitions of one record cannot both win.
#[derive(Debug, Default)]
pub struct InMemoryNodeExecutionService {
    records: DashMap<String, NodeExecution>,
}

impl InMemoryNodeExecutionService {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A snapshot of every record, ordered by start time.
    #[must_use]
    pub fn snapshot(&self) -> Vec<NodeExecution> {
        let mut all: Vec<_> = self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.start_ts.cmp(&b.start_ts).then_with(|| a.uuid.cmp(&b.uuid)));
        all
    }

    fn apply(&self, id: &str, ops: &UpdateOps) -> Result<NodeExecution, EngineError> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| EngineError::node_execution_not_found(id))?;
        ops.apply(entry.value_mut());
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl NodeExecutionService for InMemoryNodeExecutionService {
    async fn get(&self, id: &str) -> Result<NodeExecution, EngineError> {
        self.records
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| EngineError::node_execution_not_found(id))
    }

    async fn get_with_fields_included(
        &self,
        id: &str,
        fields: &[NodeField],
    ) -> Result<NodeExecution, EngineError> {
        self.records
            .get(id)
            .map(|r| r.value().project(fields))
            .ok_or_else(|| EngineError::node_execution_not_found(id))
    }

    async fn save(&self, node_execution: NodeExecution) -> Result<NodeExecution, EngineError> {
        self.records.insert(node_execution.uuid.clone(), node_execution.clone());
        Ok(node_execution)
    }

    async fn save_all(&self, node_executions: Vec<NodeExecution>) -> Result<Vec<NodeExecution>, EngineError> {
        for ne in &node_executions {
            self.records.insert(ne.uuid.clone(), ne.clone());
        }
        Ok(node_executions)
    }

    async fn update(&self, id: &str, ops: UpdateOps) -> Result<NodeExecution, EngineError> {
        self.apply(id, &ops)
    }

    async fn update_v2(&self, id: &str, ops: UpdateOps) -> Result<(), EngineError> {
        self.apply(id, &ops).map(|_| ())
    }

    async fn update_status_with_ops(
        &self,
        id: &str,
        status: Status,
        ops: Option<UpdateOps>,
        allowed_prior: &StatusSet,
    ) -> Result<Option<NodeExecution>, EngineError> {
        if allowed_prior.is_empty() {
            return Err(EngineError::EmptyStatusGuard {
                node_execution_id: id.to_string(),
                target: status,
            });
        }

        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| EngineError::node_execution_not_found(id))?;
        let ne = entry.value_mut();
        if !allowed_prior.contains(&ne.status) {
            debug!(
                node_execution_id = %id,
                current = %ne.status,
                target = %status,
                "Guarded status update lost"
            );
            return Ok(None);
        }

        ne.status = status;
        match ops {
            Some(ops) => ops.apply(ne),
            None => ne.last_updated_at = now_millis(),
        }
        Ok(Some(ne.clone()))
    }

    async fn get_all(&self, query: NodeExecutionQuery) -> Result<Vec<NodeExecution>, EngineError> {
        let mut matched: Vec<_> = self
            .records
            .iter()
            .filter(|r| query.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        matched.sort_by(|a, b| a.start_ts.cmp(&b.start_ts).then_with(|| a.uuid.cmp(&b.uuid)));

        Ok(matched
            .into_iter()
            .skip(query.page.saturating_mul(query.size))
            .take(query.size)
            .collect())
    }

    async fn mark_retried(&self, id: &str) -> Result<bool, EngineError> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| EngineError::node_execution_not_found(id))?;
        let ne = entry.value_mut();
        if ne.old_retry {
            return Ok(false);
        }
        UpdateOps::new().set(NodeExecutionUpdate::OldRetry(true)).apply(ne);
        Ok(true)
    }

    async fn error_out_active_nodes(&self, plan_execution_id: &str) -> Result<usize, EngineError> {
        let now = now_millis();
        let mut moved = 0;
        for mut entry in self.records.iter_mut() {
            let ne = entry.value_mut();
            if ne.plan_execution_id() == plan_execution_id && ne.status.is_active() {
                ne.status = Status::Errored;
                ne.end_ts = Some(now);
                ne.last_updated_at = now;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn get_by_plan_node_uuid(
        &self,
        plan_node_uuid: &str,
        plan_execution_id: &str,
    ) -> Result<Option<NodeExecution>, EngineError> {
        Ok(self
            .records
            .iter()
            .filter(|r| {
                let ne = r.value();
                ne.node_id == plan_node_uuid && ne.plan_execution_id() == plan_execution_id && !ne.old_retry
            })
            .max_by_key(|r| r.value().start_ts)
            .map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiance::{Ambiance, Level};
    use crate::core::StepType;
    use crate::plan::{Node, PlanNode};
    use std::sync::Arc;

    fn record(id: &str, exec: &str) -> NodeExecution {
        let node = Node::from(PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN")));
        let ambiance = Ambiance::new("plan", exec).clone_for_child(Level::new(id, "uuid1"));
        NodeExecution::queued(id, ambiance, &node)
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let store = InMemoryNodeExecutionService::new();
        store.save(record("a", "e1")).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().uuid, "a");
        assert!(store.get("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_guarded_update_wins_and_loses() {
        let store = InMemoryNodeExecutionService::new();
        store.save(record("a", "e1")).await.unwrap();

        let won = store
            .update_status_with_ops("a", Status::Running, None, &Status::allowed_prior_for(Status::Running))
            .await
            .unwrap();
        assert_eq!(won.map(|ne| ne.status), Some(Status::Running));

        let lost = store
            .update_status_with_ops("a", Status::Running, None, &StatusSet::from([Status::Queued]))
            .await
            .unwrap();
        assert!(lost.is_none());
        assert_eq!(store.get("a").await.unwrap().status, Status::Running);
    }

    #[tokio::test]
    async fn test_guarded_update_rejects_empty_guard() {
        let store = InMemoryNodeExecutionService::new();
        store.save(record("a", "e1")).await.unwrap();

        let err = store
            .update_status_with_ops("a", Status::Aborted, None, &StatusSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyStatusGuard { .. }));
        assert_eq!(store.get("a").await.unwrap().status, Status::Queued);
    }

    #[tokio::test]
    async fn test_concurrent_transitions_only_one_wins() {
        let store = Arc::new(InMemoryNodeExecutionService::new());
        store.save(record("a", "e1")).await.unwrap();
        store
            .update_status_with_ops("a", Status::Running, None, &Status::allowed_prior_for(Status::Running))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for target in [Status::Succeeded, Status::Aborted, Status::Skipped, Status::Succeeded] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_status_with_ops("a", target, None, &Status::allowed_prior_for(target))
                    .await
                    .unwrap()
                    .is_some()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert!(store.get("a").await.unwrap().status.is_final());
    }

    #[tokio::test]
    async fn test_update_with_ops_sets_fields() {
        let store = InMemoryNodeExecutionService::new();
        store.save(record("a", "e1")).await.unwrap();

        store
            .update_v2("a", UpdateOps::new().set(NodeExecutionUpdate::RetryIds(vec!["r".into()])))
            .await
            .unwrap();
        assert_eq!(store.get("a").await.unwrap().retry_ids, vec!["r".to_string()]);
    }

    #[tokio::test]
    async fn test_get_all_paging() {
        let store = InMemoryNodeExecutionService::new();
        for i in 0..5 {
            let mut ne = record(&format!("n{i}"), "e1");
            ne.start_ts = i;
            store.save(ne).await.unwrap();
        }
        store.save(record("other", "e2")).await.unwrap();

        let page = store
            .get_all(NodeExecutionQuery::for_plan_execution("e1").with_page(1, 2))
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|ne| ne.uuid.as_str()).collect();
        assert_eq!(ids, vec!["n2", "n3"]);
    }

    #[tokio::test]
    async fn test_mark_retried_once() {
        let store = InMemoryNodeExecutionService::new();
        store.save(record("a", "e1")).await.unwrap();

        assert!(store.mark_retried("a").await.unwrap());
        assert!(!store.mark_retried("a").await.unwrap());
        assert!(store.get("a").await.unwrap().old_retry);
    }

    #[tokio::test]
    async fn test_error_out_active_nodes() {
        let store = InMemoryNodeExecutionService::new();
        store.save(record("a", "e1")).await.unwrap();
        let mut done = record("b", "e1");
        done.status = Status::Succeeded;
        store.save(done).await.unwrap();
        store.save(record("c", "e2")).await.unwrap();

        assert_eq!(store.error_out_active_nodes("e1").await.unwrap(), 1);
        assert_eq!(store.get("a").await.unwrap().status, Status::Errored);
        assert_eq!(store.get("b").await.unwrap().status, Status::Succeeded);
        assert_eq!(store.get("c").await.unwrap().status, Status::Queued);
    }

    #[tokio::test]
    async fn test_get_by_plan_node_uuid_skips_old_retries() {
        let store = InMemoryNodeExecutionService::new();
        let mut old = record("old", "e1");
        old.old_retry = true;
        store.save(old).await.unwrap();
        store.save(record("new", "e1")).await.unwrap();

        let found = store.get_by_plan_node_uuid("uuid1", "e1").await.unwrap();
        assert_eq!(found.map(|ne| ne.uuid), Some("new".to_string()));
        assert!(store.get_by_plan_node_uuid("uuid1", "e9").await.unwrap().is_none());
    }
}
