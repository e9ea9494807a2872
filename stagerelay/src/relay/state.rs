//! Per-run pipeline state.

use crate::config::RelayConfig;
use crate::core::{PipelineEvent, RunStatus, SourceRecord, StageDescriptor};
use crate::errors::RelayError;
use crate::sources::SourceDeduplicator;
use crate::stages::{RunOutcome, StageMachine, Transition};
use crate::utils::{generate_run_id, now_utc, Timestamp};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Everything the relay knows about one run.
///
/// A state value is owned by exactly one run. The relay borrows it mutably
/// while processing; afterwards the consumer can inspect it, including after
/// cancellation.
#[derive(Debug, Clone)]
pub struct PipelineState {
    run_id: Uuid,
    status: RunStatus,
    stages: StageMachine,
    sources: SourceDeduplicator,
    report: Option<String>,
    error: Option<String>,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
}

impl PipelineState {
    /// Creates an idle state for the given declared stages.
    #[must_use]
    pub fn new<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            run_id: generate_run_id(),
            status: RunStatus::Idle,
            stages: StageMachine::new(stages),
            sources: SourceDeduplicator::new(),
            report: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Creates an idle state from a validated configuration.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;
        Ok(Self::new(config.stages.iter().cloned()))
    }

    /// Applies one classified event and returns the event to forward.
    ///
    /// `Ok(None)` means the event changed nothing worth reporting: a stage
    /// re-entry, or a source batch with no new locators. Errors leave stages,
    /// sources and the report unchanged.
    pub fn apply(&mut self, event: PipelineEvent) -> Result<Option<PipelineEvent>, RelayError> {
        self.apply_at(event, now_utc())
    }

    pub(crate) fn apply_at(
        &mut self,
        event: PipelineEvent,
        now: Timestamp,
    ) -> Result<Option<PipelineEvent>, RelayError> {
        self.begin_at(now);

        match event {
            PipelineEvent::StageChange { stage } => match self.stages.activate(&stage, now)? {
                Transition::Activated { .. } => Ok(Some(PipelineEvent::StageChange { stage })),
                Transition::Reentered { .. } => Ok(None),
            },
            PipelineEvent::Sources { sources } => {
                let added = self.sources.add_sources(sources);
                if added.is_empty() {
                    debug!(run_id = %self.run_id, "No new sources in batch");
                    return Ok(None);
                }
                Ok(Some(PipelineEvent::Sources { sources: added }))
            }
            PipelineEvent::Result { report } => {
                if !self.status.is_terminal() {
                    self.stages.finish(RunOutcome::Completed, now);
                    self.report = Some(report.clone());
                    self.status = RunStatus::Completed;
                    self.finished_at = Some(now);
                }
                Ok(Some(PipelineEvent::Result { report }))
            }
            PipelineEvent::Error { message } => {
                self.fail_at(&message, now);
                Ok(Some(PipelineEvent::Error { message }))
            }
            other @ (PipelineEvent::Status { .. } | PipelineEvent::ToolUse { .. }) => Ok(Some(other)),
        }
    }

    /// Marks the run as started, if it is idle.
    pub fn begin(&mut self) {
        self.begin_at(now_utc());
    }

    fn begin_at(&mut self, now: Timestamp) {
        if self.status == RunStatus::Idle {
            self.status = RunStatus::Running;
            self.started_at = Some(now);
        }
    }

    /// Records a fatal failure. A run that already completed keeps its status.
    pub fn fail(&mut self, message: &str) {
        self.fail_at(message, now_utc());
    }

    fn fail_at(&mut self, message: &str, now: Timestamp) {
        self.stages.finish(RunOutcome::Failed, now);
        if self.error.is_none() {
            self.error = Some(message.to_string());
        }
        if self.status != RunStatus::Completed {
            self.status = RunStatus::Failed;
        }
        self.finished_at.get_or_insert(now);
    }

    /// Records that the consumer went away. Terminal runs keep their status.
    pub fn mark_cancelled(&mut self) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Cancelled;
            self.finished_at = Some(now_utc());
        }
    }

    /// Discards everything and starts over with a fresh run id.
    pub fn clear(&mut self) {
        self.run_id = generate_run_id();
        self.status = RunStatus::Idle;
        self.stages.reset();
        self.sources.clear();
        self.report = None;
        self.error = None;
        self.started_at = None;
        self.finished_at = None;
    }

    /// Returns the run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the run status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns the stage descriptors in declared order.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        self.stages.stages()
    }

    /// Looks up a stage descriptor by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDescriptor> {
        self.stages.get(name)
    }

    /// Returns the active stage, if any.
    #[must_use]
    pub fn active_stage(&self) -> Option<&StageDescriptor> {
        self.stages.active()
    }

    /// Returns the accumulated sources in first-seen order.
    #[must_use]
    pub fn sources(&self) -> &[SourceRecord] {
        self.sources.sources()
    }

    /// Returns the final report, once a result arrived.
    #[must_use]
    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    /// Returns the failure message, if the run failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true once stage tracking has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.stages.is_terminal()
    }

    /// Returns a serializable copy of the state.
    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            run_id: self.run_id,
            status: self.status,
            stages: self.stages().to_vec(),
            sources: self.sources().to_vec(),
            report: self.report.clone(),
            error: self.error.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// A serializable view of a [`PipelineState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSnapshot {
    /// Run identifier.
    pub run_id: Uuid,
    /// Run status.
    pub status: RunStatus,
    /// Stage descriptors in declared order.
    pub stages: Vec<StageDescriptor>,
    /// Accumulated sources.
    pub sources: Vec<SourceRecord>,
    /// Final report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the first event was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the run ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}
