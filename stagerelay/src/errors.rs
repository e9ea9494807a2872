//! Error types for the stagerelay crate.
//!
//! Errors fall into two groups. Recoverable errors (`UnrecognizedEvent`,
//! `UnknownStage`, `StageRegression`, `RunTerminated`) leave the run state
//! untouched and are surfaced downstream as status diagnostics. `UpstreamFault`
//! is fatal for the run: the relay emits one error event and then terminates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for stagerelay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A raw vendor event could not be classified.
    #[error("{0}")]
    UnrecognizedEvent(#[from] UnrecognizedEventError),

    /// A stage change named a stage that was not declared for the run.
    #[error("{0}")]
    UnknownStage(#[from] UnknownStageError),

    /// A stage change would move the pipeline backwards.
    #[error("{0}")]
    StageRegression(#[from] StageRegressionError),

    /// A stage change arrived after the run reached a terminal state.
    #[error("Run already terminated; ignoring stage change to '{stage}'")]
    RunTerminated {
        /// The stage that was requested.
        stage: String,
    },

    /// The upstream producer failed.
    #[error("Upstream fault: {0}")]
    UpstreamFault(String),

    /// The relay configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Creates a run-terminated error.
    #[must_use]
    pub fn run_terminated(stage: impl Into<String>) -> Self {
        Self::RunTerminated {
            stage: stage.into(),
        }
    }

    /// Creates an upstream fault from any displayable producer error.
    #[must_use]
    pub fn upstream(err: &anyhow::Error) -> Self {
        // `{:#}` keeps the whole context chain on one line.
        Self::UpstreamFault(format!("{err:#}"))
    }

    /// Returns true if the run can continue after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedEvent(_)
                | Self::UnknownStage(_)
                | Self::StageRegression(_)
                | Self::RunTerminated { .. }
        )
    }

    /// Returns the stable diagnostic code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnrecognizedEvent(_) => "RELAY-001-UNRECOGNIZED",
            Self::UnknownStage(_) => "RELAY-002-UNKNOWN_STAGE",
            Self::StageRegression(_) => "RELAY-003-REGRESSION",
            Self::RunTerminated { .. } => "RELAY-004-TERMINATED",
            Self::UpstreamFault(_) => "RELAY-005-UPSTREAM",
            Self::Config(_) => "RELAY-006-CONFIG",
            Self::Serialization(_) => "RELAY-007-SERIALIZATION",
            Self::Internal(_) => "RELAY-008-INTERNAL",
        }
    }

    /// Builds the diagnostic info attached to status events.
    #[must_use]
    pub fn info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.code(), self.to_string());
        match self {
            Self::UnknownStage(err) => info
                .with_context_entry("stage", &err.stage)
                .with_context_entry("declared", err.declared.join(","))
                .with_fix_hint("Declare the stage in RelayConfig::stages or fix the marker text."),
            Self::StageRegression(err) => info
                .with_context_entry("stage", &err.stage)
                .with_context_entry("latest", &err.latest),
            Self::RunTerminated { stage } => info.with_context_entry("stage", stage),
            _ => info,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = self.info().to_dict();
        map.insert(
            "recoverable".to_string(),
            serde_json::Value::Bool(self.is_recoverable()),
        );
        map
    }
}

/// Diagnostic metadata about an error.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "RELAY-002-UNKNOWN_STAGE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised when a raw event matches none of the known shapes.
#[derive(Debug, Clone, Error)]
#[error("Unrecognized event: {reason}")]
pub struct UnrecognizedEventError {
    /// Why classification failed.
    pub reason: String,
    /// The raw payload, preserved for observability.
    pub raw: serde_json::Value,
}

impl UnrecognizedEventError {
    /// Creates a new unrecognized event error.
    #[must_use]
    pub fn new(reason: impl Into<String>, raw: serde_json::Value) -> Self {
        Self {
            reason: reason.into(),
            raw,
        }
    }
}

/// Error raised when a stage change names an undeclared stage.
#[derive(Debug, Clone, Error)]
#[error("Unknown stage '{stage}'")]
pub struct UnknownStageError {
    /// The requested stage.
    pub stage: String,
    /// The declared stage names, in order.
    pub declared: Vec<String>,
}

impl UnknownStageError {
    /// Creates a new unknown stage error.
    #[must_use]
    pub fn new(stage: impl Into<String>, declared: Vec<String>) -> Self {
        Self {
            stage: stage.into(),
            declared,
        }
    }
}

/// Error raised when a stage change would re-open a finished stage or
/// activate a stage declared before the latest active one.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' cannot activate after '{latest}'")]
pub struct StageRegressionError {
    /// The requested stage.
    pub stage: String,
    /// The most recently activated stage.
    pub latest: String,
}

impl StageRegressionError {
    /// Creates a new stage regression error.
    #[must_use]
    pub fn new(stage: impl Into<String>, latest: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            latest: latest.into(),
        }
    }
}
