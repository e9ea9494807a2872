//! Classification of raw agent runtime events.
//!
//! The agent runtime owns its event format. Classifiers map each raw record
//! to exactly one normalized [`PipelineEvent`](crate::core::PipelineEvent),
//! or fail with an unrecognized-event error that the relay surfaces as a
//! status diagnostic.

mod agent;
mod marker;
mod raw;

pub use agent::AgentEventClassifier;
pub use marker::{is_marker_stage_name, StageMarkerParser};
pub use raw::RawEvent;

use crate::core::PipelineEvent;
use crate::errors::RelayError;

/// Maps raw runtime records to normalized events.
///
/// Implementations must be pure: the same record always classifies the same
/// way and classification never mutates run state.
pub trait EventClassifier: Send + Sync {
    /// Classifies one raw record.
    fn classify(&self, raw: &RawEvent) -> Result<PipelineEvent, RelayError>;
}

impl<T: EventClassifier + ?Sized> EventClassifier for std::sync::Arc<T> {
    fn classify(&self, raw: &RawEvent) -> Result<PipelineEvent, RelayError> {
        (**self).classify(raw)
    }
}
