//! Event sink trait and implementations.

use crate::core::PipelineEvent;
use async_trait::async_trait;
use tracing::{debug, info, Level};
use uuid::Uuid;

/// Trait for sinks that observe relayed events.
///
/// Sinks see exactly the events the consumer sees, in the same order.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    ///
    /// # Arguments
    ///
    /// * `run_id` - The run the event belongs to
    /// * `event` - The normalized event
    async fn emit(&self, run_id: Uuid, event: &PipelineEvent);

    /// Emits an event without blocking.
    ///
    /// This method must never panic. Errors are logged and suppressed.
    fn try_emit(&self, run_id: Uuid, event: &PipelineEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _run_id: Uuid, _event: &PipelineEvent) {}

    fn try_emit(&self, _run_id: Uuid, _event: &PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
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
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    fn log_event(&self, run_id: Uuid, event: &PipelineEvent) {
        let event_type = event.event_type();
        let data = serde_json::to_string(event).unwrap_or_default();
        if self.level == Level::DEBUG {
            debug!(run_id = %run_id, event_type = %event_type, event_data = %data, "Event: {}", event_type);
        } else {
            info!(run_id = %run_id, event_type = %event_type, event_data = %data, "Event: {}", event_type);
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, run_id: Uuid, event: &PipelineEvent) {
        self.log_event(run_id, event);
    }

    fn try_emit(&self, run_id: Uuid, event: &PipelineEvent) {
        self.log_event(run_id, event);
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(Uuid, PipelineEvent)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Returns collected events belonging to one run.
    #[must_use]
    pub fn events_for(&self, run_id: Uuid) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events with the given `type` tag.
    #[must_use]
    pub fn events_of_type(&self, event_type: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|(_, e)| e.event_type() == event_type)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, run_id: Uuid, event: &PipelineEvent) {
        self.events.write().push((run_id, event.clone()));
    }

    fn try_emit(&self, run_id: Uuid, event: &PipelineEvent) {
        self.events.write().push((run_id, event.clone()));
    }
}
