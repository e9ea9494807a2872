//! Event sinks for observability.
//!
//! The relay mirrors every event it forwards into an [`EventSink`]. Sinks are
//! passed explicitly to each relay; there is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
