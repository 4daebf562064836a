//! Test assertions for node executions.

use crate::core::Status;
use crate::execution::NodeExecution;

/// Asserts that the record has the expected status.
pub fn assert_status(ne: &NodeExecution, expected: Status) {
    assert_eq!(
        ne.status, expected,
        "Expected {} ({}) to be {expected}, got {}",
        ne.identifier, ne.uuid, ne.status
    );
}

/// Asserts that the record reached a final status and has an end time.
pub fn assert_finished(ne: &NodeExecution) {
    assert!(
        ne.status.is_final(),
        "Expected {} ({}) to be finished, got {}",
        ne.identifier,
        ne.uuid,
        ne.status
    );
    assert!(ne.end_ts.is_some(), "Expected {} to have an end time", ne.uuid);
}

/// Asserts that `copy` is a retry-lineage copy of `original_id`.
pub fn assert_copied_from(copy: &NodeExecution, original_id: &str) {
    assert_eq!(
        copy.original_node_execution_id.as_deref(),
        Some(original_id),
        "Expected {} to be copied from {original_id}",
        copy.uuid
    );
    assert!(copy.old_retry, "Expected copy {} to be flagged as an old retry", copy.uuid);
    assert_ne!(copy.uuid, original_id, "A copy must have its own id");
}
