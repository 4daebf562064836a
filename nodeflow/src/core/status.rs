//! Node execution status and the allowed-prior sets used by guarded updates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A set of statuses, ordered for stable logging.
pub type StatusSet = BTreeSet<Status>;

/// The execution status of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Created, not yet started.
    #[default]
    Queued,
    /// Step behaviour is executing.
    Running,
    /// Waiting for an in-process async callback.
    AsyncWaiting,
    /// Waiting for a remote task to report back.
    TaskWaiting,
    /// Suspended until an external interrupt moves it on.
    InterventionWaiting,
    /// An abort has been requested and is propagating.
    Discontinuing,
    /// Completed successfully.
    Succeeded,
    /// Step reported failure.
    Failed,
    /// The engine failed to drive the node.
    Errored,
    /// Node was skipped.
    Skipped,
    /// Node was aborted.
    Aborted,
    /// Node timed out.
    Expired,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::AsyncWaiting => "ASYNC_WAITING",
            Self::TaskWaiting => "TASK_WAITING",
            Self::InterventionWaiting => "INTERVENTION_WAITING",
            Self::Discontinuing => "DISCONTINUING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Errored => "ERRORED",
            Self::Skipped => "SKIPPED",
            Self::Aborted => "ABORTED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

const ACTIVE: [Status; 4] = [
    Status::Queued,
    Status::Running,
    Status::AsyncWaiting,
    Status::TaskWaiting,
];

impl Status {
    /// Returns true if no further transition is expected.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Errored | Self::Skipped | Self::Aborted | Self::Expired
        )
    }

    /// Returns true for statuses that advance the plan like a success.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped)
    }

    /// Returns true for failure statuses an intervention can act on.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Failed | Self::Errored | Self::Expired)
    }

    /// Returns true while the node still holds work (queued, running or waiting).
    #[must_use]
    pub fn is_active(&self) -> bool {
        ACTIVE.contains(self)
    }

    /// The statuses a node may hold for a guarded update to `target` to win.
    ///
    /// Only `Queued` yields an empty set: a node never re-enters the queue.
    #[must_use]
    pub fn allowed_prior_for(target: Self) -> StatusSet {
        match target {
            Self::Queued => StatusSet::new(),
            Self::Running => [Self::Queued, Self::AsyncWaiting, Self::TaskWaiting, Self::InterventionWaiting]
                .into_iter()
                .collect(),
            Self::AsyncWaiting | Self::TaskWaiting => [Self::Queued, Self::Running].into_iter().collect(),
            Self::InterventionWaiting => [
                Self::Running,
                Self::AsyncWaiting,
                Self::TaskWaiting,
                Self::Failed,
                Self::Errored,
                Self::Expired,
            ]
            .into_iter()
            .collect(),
            Self::Discontinuing
            | Self::Succeeded
            | Self::Failed
            | Self::Errored
            | Self::Skipped
            | Self::Expired => ACTIVE.into_iter().chain([Self::InterventionWaiting]).collect(),
            Self::Aborted => ACTIVE
                .into_iter()
                .chain([Self::InterventionWaiting, Self::Discontinuing])
                .collect(),
        }
    }

    /// The statuses a mark-success may flip to SUCCEEDED: broken or parked
    /// nodes only. Step responses never use this set.
    #[must_use]
    pub fn mark_success_prior() -> StatusSet {
        [Self::Failed, Self::Errored, Self::Expired, Self::InterventionWaiting]
            .into_iter()
            .collect()
    }

    /// All non-final statuses.
    #[must_use]
    pub fn flowing() -> StatusSet {
        ACTIVE
            .into_iter()
            .chain([Self::InterventionWaiting, Self::Discontinuing])
            .collect()
    }
}
