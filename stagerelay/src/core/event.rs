//! Normalized pipeline events and relay frames.

use super::SourceRecord;
use crate::errors::RelayError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A normalized event forwarded to the consumer.
///
/// Events are immutable once emitted. Ordering among events of one run is
/// significant and preserved by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A declared stage became active.
    StageChange {
        /// The stage name.
        stage: String,
    },
    /// Progress text or a recoverable diagnostic.
    Status {
        /// Human-readable message.
        message: String,
        /// Diagnostic code for recoverable errors.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// The raw vendor payload, kept when classification failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<serde_json::Value>,
    },
    /// The agent invoked a tool.
    ToolUse {
        /// Tool name.
        tool: String,
        /// Tool input as sent by the agent.
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Sources discovered by a search tool.
    Sources {
        /// The records; after relaying, only those new to the run.
        sources: Vec<SourceRecord>,
    },
    /// The final report.
    Result {
        /// Report text.
        report: String,
    },
    /// The run failed.
    Error {
        /// Failure description.
        message: String,
    },
}

impl PipelineEvent {
    /// Creates a stage change event.
    #[must_use]
    pub fn stage_change(stage: impl Into<String>) -> Self {
        Self::StageChange {
            stage: stage.into(),
        }
    }

    /// Creates a plain status event.
    #[must_use]
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
            code: None,
            raw: None,
        }
    }

    /// Creates a status event describing a recoverable error.
    ///
    /// For unrecognized events the raw payload is carried along.
    #[must_use]
    pub fn diagnostic(err: &RelayError) -> Self {
        let raw = match err {
            RelayError::UnrecognizedEvent(inner) => Some(inner.raw.clone()),
            _ => None,
        };
        Self::Status {
            message: err.to_string(),
            code: Some(err.code().to_string()),
            raw,
        }
    }

    /// Creates a result event.
    #[must_use]
    pub fn result(report: impl Into<String>) -> Self {
        Self::Result {
            report: report.into(),
        }
    }

    /// Creates an error event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns the serialized `type` tag.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageChange { .. } => "stage_change",
            Self::Status { .. } => "status",
            Self::ToolUse { .. } => "tool_use",
            Self::Sources { .. } => "sources",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }

    /// Returns true for events that end a run's stage tracking.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }

    /// Converts the event to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::from([("type".to_string(), serde_json::json!(self.event_type()))]),
        }
    }
}

/// A frame on the relay's output channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayFrame {
    /// A normalized event.
    Event(PipelineEvent),
    /// End-of-stream sentinel. Nothing follows it.
    End,
}

impl RelayFrame {
    /// Returns the event, if this is a data frame.
    #[must_use]
    pub fn as_event(&self) -> Option<&PipelineEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::End => None,
        }
    }

    /// Returns true for the end-of-stream sentinel.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl From<PipelineEvent> for RelayFrame {
    fn from(event: PipelineEvent) -> Self {
        Self::Event(event)
    }
}
