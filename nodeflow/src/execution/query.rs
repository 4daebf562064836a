//! Criteria for listing node executions.

use super::NodeExecution;
use crate::core::StatusSet;

/// Default page size for listing queries.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Filter and paging for [`NodeExecutionService::get_all`](crate::services::NodeExecutionService::get_all).
///
/// Unset filters match everything. Results are ordered by `start_ts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeExecutionQuery {
    /// Only executions of this plan execution.
    pub plan_execution_id: Option<String>,
    /// Only these ids.
    pub uuids: Option<Vec<String>>,
    /// Only children of this node execution.
    pub parent_id: Option<String>,
    /// Only executions in one of these statuses.
    pub statuses: Option<StatusSet>,
    /// Skip attempts replaced by a retry.
    pub exclude_old_retries: bool,
    /// Zero-based page.
    pub page: usize,
    /// Page size.
    pub size: usize,
}

impl Default for NodeExecutionQuery {
    fn default() -> Self {
        Self {
            plan_execution_id: None,
            uuids: None,
            parent_id: None,
            statuses: None,
            exclude_old_retries: false,
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl NodeExecutionQuery {
    /// Executions of one plan execution.
    #[must_use]
    pub fn for_plan_execution(plan_execution_id: impl Into<String>) -> Self {
        Self {
            plan_execution_id: Some(plan_execution_id.into()),
            ..Self::default()
        }
    }

    /// Executions with the given ids.
    #[must_use]
    pub fn by_uuids(uuids: Vec<String>) -> Self {
        Self {
            uuids: Some(uuids),
            ..Self::default()
        }
    }

    /// Restricts to children of `parent_id`.
    #[must_use]
    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Restricts to `statuses`.
    #[must_use]
    pub fn with_statuses(mut self, statuses: StatusSet) -> Self {
        self.statuses = Some(statuses);
        self
    }

    /// Skips old retries.
    #[must_use]
    pub fn excluding_old_retries(mut self) -> Self {
        self.exclude_old_retries = true;
        self
    }

    /// Selects a page.
    #[must_use]
    pub fn with_page(mut self, page: usize, size: usize) -> Self {
        self.page = page;
        self.size = size;
        self
    }

    /// True when `ne` passes every filter.
    #[must_use]
    pub fn matches(&self, ne: &NodeExecution) -> bool {
        if self
            .plan_execution_id
            .as_deref()
            .is_some_and(|id| ne.plan_execution_id() != id)
        {
            return false;
        }
        if self.uuids.as_ref().is_some_and(|ids| !ids.contains(&ne.uuid)) {
            return false;
        }
        if self
            .parent_id
            .as_deref()
            .is_some_and(|id| ne.parent_id.as_deref() != Some(id))
        {
            return false;
        }
        if self.statuses.as_ref().is_some_and(|s| !s.contains(&ne.status)) {
            return false;
        }
        !(self.exclude_old_retries && ne.old_retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiance::{Ambiance, Level};
    use crate::core::{Status, StepType};
    use crate::plan::{Node, PlanNode};

    fn record(id: &str, exec: &str) -> NodeExecution {
        let node = Node::from(PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN")));
        let ambiance = Ambiance::new("plan", exec).clone_for_child(Level::new(id, "uuid1"));
        NodeExecution::queued(id, ambiance, &node)
    }

    #[test]
    fn test_default_matches_everything() {
        assert!(NodeExecutionQuery::default().matches(&record("a", "e1")));
    }

    #[test]
    fn test_filters() {
        let mut ne = record("a", "e1");
        ne.parent_id = Some("p".into());
        ne.status = Status::Failed;

        assert!(NodeExecutionQuery::for_plan_execution("e1").matches(&ne));
        assert!(!NodeExecutionQuery::for_plan_execution("e2").matches(&ne));
        assert!(NodeExecutionQuery::by_uuids(vec!["a".into()]).matches(&ne));
        assert!(!NodeExecutionQuery::by_uuids(vec!["b".into()]).matches(&ne));
        assert!(NodeExecutionQuery::default().with_parent_id("p").matches(&ne));
        assert!(!NodeExecutionQuery::default()
            .with_statuses(StatusSet::from([Status::Succeeded]))
            .matches(&ne));
    }

    #[test]
    fn test_excluding_old_retries() {
        let mut ne = record("a", "e1");
        ne.old_retry = true;
        assert!(NodeExecutionQuery::default().matches(&ne));
        assert!(!NodeExecutionQuery::default().excluding_old_retries().matches(&ne));
    }
}
