//! The persisted record of one node execution.

use super::{AdviserResponse, InterruptEffect};
use crate::ambiance::Ambiance;
use crate::core::{ExecutionMode, Status, StepType};
use crate::plan::Node;
use crate::utils::now_millis;
use serde::{Deserialize, Serialize};

/// Why a node failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureInfo {
    /// Human readable failure message.
    pub message: String,
}

impl FailureInfo {
    /// Creates failure info.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Progress of one unit of work inside a step (console sections, commands).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitProgress {
    /// Unit name.
    pub unit_name: String,
    /// Unit status.
    pub status: Status,
}

/// What the step behaviour handed back when it started: how its completion
/// will arrive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ExecutableResponse {
    /// Completed inline.
    Sync,
    /// Waiting on in-process callbacks.
    Async {
        /// Callback ids that resume the node.
        callback_ids: Vec<String>,
    },
    /// Waiting on a remote task.
    Task {
        /// Remote task id.
        task_id: String,
    },
    /// Running one child node.
    Child {
        /// Plan node uuid of the child.
        child_node_id: String,
    },
    /// Running several child nodes.
    Children {
        /// Plan node uuids of the children.
        child_node_ids: Vec<String>,
    },
    /// Running a whole child pipeline.
    PipelineStage {
        /// Plan execution id of the child pipeline run.
        child_plan_execution_id: String,
    },
}

impl ExecutableResponse {
    /// The execution mode this response implies.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::Sync => ExecutionMode::Sync,
            Self::Async { .. } | Self::PipelineStage { .. } => ExecutionMode::Async,
            Self::Task { .. } => ExecutionMode::Task,
            Self::Child { .. } => ExecutionMode::Child,
            Self::Children { .. } => ExecutionMode::Children,
        }
    }

    /// The status a node holds while this response is outstanding.
    ///
    /// Parents of child nodes stay RUNNING until their children report back.
    #[must_use]
    pub fn waiting_status(&self) -> Status {
        match self {
            Self::Task { .. } => Status::TaskWaiting,
            Self::Async { .. } | Self::PipelineStage { .. } => Status::AsyncWaiting,
            Self::Sync | Self::Child { .. } | Self::Children { .. } => Status::Running,
        }
    }
}

/// Fields of a node execution, for projected reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeField {
    /// The ambiance.
    Ambiance,
    /// Plan node uuid.
    NodeId,
    /// Identifier and name.
    Identifier,
    /// Step type.
    StepType,
    /// Status.
    Status,
    /// Execution mode.
    Mode,
    /// Adviser response.
    AdviserResponse,
    /// Failure info.
    FailureInfo,
    /// Notify id.
    NotifyId,
    /// Parent and previous ids.
    Adjacency,
    /// Interrupt history.
    InterruptHistory,
    /// Retry ids and the old-retry flag.
    RetryIds,
    /// Original node execution id.
    OriginalNodeExecutionId,
    /// Executable responses.
    ExecutableResponses,
    /// Unit progresses.
    UnitProgresses,
}

impl NodeField {
    /// Fields needed to finish a node and notify its waiter.
    pub const END_NODE_FIELDS: &'static [Self] = &[
        Self::Ambiance,
        Self::NodeId,
        Self::Identifier,
        Self::Status,
        Self::AdviserResponse,
        Self::NotifyId,
    ];
}

/// One execution of a plan node within a plan execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecution {
    /// Unique id, also the runtime id of its ambiance level.
    pub uuid: String,
    /// Context the node runs in.
    pub ambiance: Ambiance,
    /// Uuid of the plan node; the node itself is resolved through the plan.
    pub node_id: String,
    /// Plan node identifier.
    pub identifier: String,
    /// Plan node name.
    pub name: String,
    /// Plan node step type.
    pub step_type: StepType,
    /// Owning stage fqn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_fqn: Option<String>,
    /// Current status.
    pub status: Status,
    /// Execution shape.
    pub mode: ExecutionMode,
    /// Creation time (epoch millis).
    pub start_ts: i64,
    /// Time a final status was reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ts: Option<i64>,
    /// Last write time.
    pub last_updated_at: i64,
    /// Advice computed from the step result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adviser_response: Option<AdviserResponse>,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_info: Option<FailureInfo>,
    /// Interrupts that took effect on this lineage, in `took_effect_at` order.
    #[serde(default)]
    pub interrupt_history: Vec<InterruptEffect>,
    /// Ids of the earlier attempts of this node.
    #[serde(default)]
    pub retry_ids: Vec<String>,
    /// True once a newer attempt replaced this one.
    #[serde(default)]
    pub old_retry: bool,
    /// The execution this one was copied or replayed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_node_execution_id: Option<String>,
    /// Key of the waiter blocked on this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_id: Option<String>,
    /// Enclosing node execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Preceding sibling node execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_id: Option<String>,
    /// Depth of the ambiance when created.
    pub level_count: usize,
    /// Unit progresses reported by the step.
    #[serde(default)]
    pub unit_progresses: Vec<UnitProgress>,
    /// How completion of the step will arrive.
    #[serde(default)]
    pub executable_responses: Vec<ExecutableResponse>,
}

impl NodeExecution {
    /// Builds a QUEUED execution of `node` active at the top of `ambiance`.
    ///
    /// The uuid is taken from the ambiance's current runtime id so the record
    /// and its level always agree.
    #[must_use]
    pub fn queued(uuid: impl Into<String>, ambiance: Ambiance, node: &Node) -> Self {
        let plan_node = node.plan_node();
        let now = now_millis();
        Self {
            uuid: uuid.into(),
            level_count: ambiance.depth(),
            ambiance,
            node_id: plan_node.uuid.clone(),
            identifier: plan_node.identifier.clone(),
            name: plan_node.name.clone(),
            step_type: plan_node.step_type.clone(),
            stage_fqn: plan_node.stage_fqn.clone(),
            status: Status::Queued,
            mode: ExecutionMode::Sync,
            start_ts: now,
            end_ts: None,
            last_updated_at: now,
            adviser_response: None,
            failure_info: None,
            interrupt_history: Vec::new(),
            retry_ids: Vec::new(),
            old_retry: false,
            original_node_execution_id: node.original_node_execution_id().map(str::to_string),
            notify_id: None,
            parent_id: None,
            previous_id: None,
            unit_progresses: Vec::new(),
            executable_responses: Vec::new(),
        }
    }

    /// Plan execution this record belongs to.
    #[must_use]
    pub fn plan_execution_id(&self) -> &str {
        &self.ambiance.plan_execution_id
    }

    /// A copy carrying only `fields` (plus the uuid); everything else is reset.
    #[must_use]
    pub fn project(&self, fields: &[NodeField]) -> Self {
        let has = |f: NodeField| fields.contains(&f);
        let mut out = self.clone();
        if !has(NodeField::Ambiance) {
            out.ambiance = Ambiance::default();
        }
        if !has(NodeField::NodeId) {
            out.node_id = String::new();
        }
        if !has(NodeField::Identifier) {
            out.identifier = String::new();
            out.name = String::new();
        }
        if !has(NodeField::StepType) {
            out.step_type = StepType::step("");
            out.stage_fqn = None;
        }
        if !has(NodeField::Status) {
            out.status = Status::default();
        }
        if !has(NodeField::Mode) {
            out.mode = ExecutionMode::default();
        }
        if !has(NodeField::AdviserResponse) {
            out.adviser_response = None;
        }
        if !has(NodeField::FailureInfo) {
            out.failure_info = None;
        }
        if !has(NodeField::NotifyId) {
            out.notify_id = None;
        }
        if !has(NodeField::Adjacency) {
            out.parent_id = None;
            out.previous_id = None;
        }
        if !has(NodeField::InterruptHistory) {
            out.interrupt_history = Vec::new();
        }
        if !has(NodeField::RetryIds) {
            out.retry_ids = Vec::new();
            out.old_retry = false;
        }
        if !has(NodeField::OriginalNodeExecutionId) {
            out.original_node_execution_id = None;
        }
        if !has(NodeField::ExecutableResponses) {
            out.executable_responses = Vec::new();
        }
        if !has(NodeField::UnitProgresses) {
            out.unit_progresses = Vec::new();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiance::Level;
    use crate::plan::{IdentityPlanNode, PlanNode};

    fn ambiance() -> Ambiance {
        Ambiance::new("plan", "exec").clone_for_child(Level::new("ne-1", "uuid1"))
    }

    #[test]
    fn test_queued_copies_node_fields() {
        let node = Node::from(PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN")));
        let ne = NodeExecution::queued("ne-1", ambiance(), &node);

        assert_eq!(ne.status, Status::Queued);
        assert_eq!(ne.node_id, "uuid1");
        assert_eq!(ne.identifier, "test");
        assert_eq!(ne.level_count, 1);
        assert_eq!(ne.plan_execution_id(), "exec");
        assert!(ne.original_node_execution_id.is_none());
    }

    #[test]
    fn test_queued_identity_node_keeps_original_id() {
        let node = Node::from(IdentityPlanNode::from_plan_node(
            PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN")),
            "orig-1",
        ));
        let ne = NodeExecution::queued("ne-1", ambiance(), &node);
        assert_eq!(ne.original_node_execution_id.as_deref(), Some("orig-1"));
    }

    #[test]
    fn test_project_keeps_only_requested_fields() {
        let node = Node::from(PlanNode::new("uuid1", "test", StepType::step("TEST_STEP_PLAN")));
        let mut ne = NodeExecution::queued("ne-1", ambiance(), &node);
        ne.notify_id = Some("notify".into());
        ne.parent_id = Some("parent".into());
        ne.retry_ids = vec!["r1".into()];
        ne.status = Status::Succeeded;

        let projected = ne.project(NodeField::END_NODE_FIELDS);

        assert_eq!(projected.uuid, "ne-1");
        assert_eq!(projected.status, Status::Succeeded);
        assert_eq!(projected.notify_id.as_deref(), Some("notify"));
        assert_eq!(projected.identifier, "test");
        assert!(projected.parent_id.is_none());
        assert!(projected.retry_ids.is_empty());
    }

    #[test]
    fn test_executable_response_mode() {
        assert_eq!(
            ExecutableResponse::Task { task_id: "t".into() }.mode(),
            ExecutionMode::Task
        );
        assert_eq!(
            ExecutableResponse::Task { task_id: "t".into() }.waiting_status(),
            Status::TaskWaiting
        );
        assert_eq!(
            ExecutableResponse::Children { child_node_ids: vec![] }.waiting_status(),
            Status::Running
        );
    }
}
