//! Event sink trait and implementations.

use super::NodeEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Receives node lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: NodeEvent);

    /// Emits an event without blocking.
    ///
    /// Never fails; sinks log and drop what they cannot deliver.
    fn try_emit(&self, event: NodeEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: NodeEvent) {}

    fn try_emit(&self, _event: NodeEvent) {}
}

/// Writes events to the tracing subscriber.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level` (DEBUG or INFO).
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// A debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event: &NodeEvent) {
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.kind,
                node_execution_id = %event.node_execution_id,
                plan_execution_id = %event.plan_execution_id,
                status = %event.status,
                "Event: {}", event.kind
            );
        } else {
            info!(
                event_type = %event.kind,
                node_execution_id = %event.node_execution_id,
                plan_execution_id = %event.plan_execution_id,
                status = %event.status,
                "Event: {}", event.kind
            );
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: NodeEvent) {
        self.log_event(&event);
    }

    fn try_emit(&self, event: NodeEvent) {
        self.log_event(&event);
    }
}

/// Keeps every event in memory; used by tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<NodeEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<NodeEvent> {
        self.events.read().clone()
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<NodeEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind.as_str().starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Events about one node execution.
    #[must_use]
    pub fn events_for(&self, node_execution_id: &str) -> Vec<NodeEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.node_execution_id == node_execution_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: NodeEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: NodeEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Status;
    use crate::events::NodeEventKind;

    fn event(kind: NodeEventKind, id: &str) -> NodeEvent {
        NodeEvent::new(kind, id, "exec", "uuid1", Status::Running)
    }

    #[tokio::test]
    async fn test_noop_and_logging_sinks() {
        NoOpEventSink.emit(event(NodeEventKind::Started, "a")).await;
        LoggingEventSink::default().try_emit(event(NodeEventKind::Ended, "a"));
        LoggingEventSink::debug().emit(event(NodeEventKind::Ended, "a")).await;
    }

    #[tokio::test]
    async fn test_collecting_sink_filters() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(event(NodeEventKind::Started, "a")).await;
        sink.try_emit(event(NodeEventKind::StatusChanged, "a"));
        sink.try_emit(event(NodeEventKind::Started, "b"));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("node.started").len(), 2);
        assert_eq!(sink.events_for("a").len(), 2);
    }
}
