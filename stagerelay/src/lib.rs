//! # Stagerelay
//!
//! Stage tracking and event relay for multi-stage agent pipelines.
//!
//! An agent runtime works through a fixed list of stages (for example
//! planner, web-search, report-writer) and emits a heterogeneous stream of
//! vendor records while it does. Stagerelay turns that stream into a clean,
//! ordered sequence of normalized events for a consumer:
//!
//! - **Classification**: raw records become stage changes, status messages,
//!   tool calls, sources, results and errors
//! - **Stage tracking**: a per-run state machine keeps at most one stage
//!   active and stage order non-decreasing
//! - **Source deduplication**: sources are accumulated once per locator
//! - **Relaying**: events are forwarded in order with backpressure, followed
//!   by an end-of-stream sentinel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stagerelay::prelude::*;
//! use stagerelay::testing::ScriptedUpstream;
//!
//! # async fn demo() -> Result<(), RelayError> {
//! let config = RelayConfig::default();
//! let relay = StreamRelay::from_config(&config)?;
//! let state = PipelineState::from_config(&config)?;
//!
//! let upstream = ScriptedUpstream::new()
//!     .stage("planner")
//!     .result("# Report")
//!     .into_stream();
//!
//! let mut handle = relay.spawn(upstream, state);
//! while let Some(event) = handle.events().next_event().await {
//!     println!("{}", event.event_type());
//! }
//! let report = handle.join().await?;
//! assert_eq!(report.state.report(), Some("# Report"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod classifier;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod relay;
pub mod sources;
pub mod sse;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::classifier::{AgentEventClassifier, EventClassifier, RawEvent};
    pub use crate::config::RelayConfig;
    pub use crate::core::{
        PipelineEvent, RelayFrame, RunStatus, SourceRecord, StageDescriptor, StageStatus,
    };
    pub use crate::errors::{ErrorInfo, RelayError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::relay::{
        PipelineSnapshot, PipelineState, RelayHandle, RelayOutcome, RelayStream, RunReport,
        StreamRelay,
    };
    pub use crate::sources::SourceDeduplicator;
    pub use crate::stages::StageMachine;
    pub use crate::utils::{iso_timestamp, Timestamp};
}
