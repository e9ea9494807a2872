//! Declared stage descriptor.

use super::StageStatus;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};

/// The tracked state of one declared stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// The stage name, unique within a run.
    pub name: String,
    /// Current status.
    pub status: StageStatus,
    /// When the stage last became active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    /// When the stage finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
}

impl StageDescriptor {
    /// Creates a pending descriptor.
    #[must_use]
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Pending,
            start_time: None,
            end_time: None,
        }
    }

    /// Returns the time spent active in milliseconds, if finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    pub(crate) fn activate(&mut self, now: Timestamp) {
        self.status = StageStatus::Active;
        self.start_time = Some(now);
    }

    pub(crate) fn finish(&mut self, status: StageStatus, now: Timestamp) {
        self.status = status;
        self.end_time = Some(now);
    }
}
