//! The stage state machine.

use crate::core::{StageDescriptor, StageStatus};
use crate::errors::{RelayError, StageRegressionError, UnknownStageError};
use crate::utils::Timestamp;
use tracing::{debug, info};

/// How a run ended, from the stage machine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A result arrived; active stages complete.
    Completed,
    /// An error arrived; active stages are marked as errored.
    Failed,
}

/// The effect of an accepted stage change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The stage became active; `completed` lists stages closed by the change.
    Activated {
        /// The newly active stage.
        stage: String,
        /// Stages that moved from active to completed.
        completed: Vec<String>,
    },
    /// The stage was already active; its start time was refreshed.
    Reentered {
        /// The active stage.
        stage: String,
    },
}

impl Transition {
    /// Returns the stage that is active after the transition.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::Activated { stage, .. } | Self::Reentered { stage } => stage,
        }
    }
}

/// Tracks ordered stage progression for one run.
///
/// Invariants:
/// - at most one stage is active;
/// - a stage is only completed after being active;
/// - activations follow the declared order, skipped stages stay pending;
/// - once terminal, no stage change is accepted.
///
/// Rejected changes return an error and leave every descriptor untouched.
#[derive(Debug, Clone)]
pub struct StageMachine {
    stages: Vec<StageDescriptor>,
    /// Index of the most recently activated stage.
    latest: Option<usize>,
    outcome: Option<RunOutcome>,
}

impl StageMachine {
    /// Creates a machine with every declared stage pending.
    ///
    /// Names are expected to be unique; see [`crate::config::RelayConfig::validate`].
    #[must_use]
    pub fn new<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stages: stages.into_iter().map(StageDescriptor::pending).collect(),
            latest: None,
            outcome: None,
        }
    }

    /// Applies a stage change.
    pub fn activate(&mut self, name: &str, now: Timestamp) -> Result<Transition, RelayError> {
        if self.outcome.is_some() {
            return Err(RelayError::run_terminated(name));
        }

        let index = self.index_of(name).ok_or_else(|| {
            RelayError::from(UnknownStageError::new(name, self.declared_names()))
        })?;

        match self.stages[index].status {
            StageStatus::Active => {
                self.stages[index].start_time = Some(now);
                debug!(stage = %name, "Stage re-entered");
                return Ok(Transition::Reentered {
                    stage: name.to_string(),
                });
            }
            StageStatus::Completed | StageStatus::Error => {
                return Err(self.regression(name));
            }
            StageStatus::Pending => {}
        }

        if self.latest.is_some_and(|latest| index < latest) {
            return Err(self.regression(name));
        }

        let completed = self.close_active(StageStatus::Completed, now);
        self.stages[index].activate(now);
        self.latest = Some(index);

        info!(stage = %name, completed = ?completed, "Stage activated");
        Ok(Transition::Activated {
            stage: name.to_string(),
            completed,
        })
    }

    /// Moves the machine to its terminal state and returns the stages closed.
    ///
    /// Calling this on an already terminal machine changes nothing.
    pub fn finish(&mut self, outcome: RunOutcome, now: Timestamp) -> Vec<String> {
        if self.outcome.is_some() {
            return Vec::new();
        }
        self.outcome = Some(outcome);

        let status = match outcome {
            RunOutcome::Completed => StageStatus::Completed,
            RunOutcome::Failed => StageStatus::Error,
        };
        let closed = self.close_active(status, now);
        info!(outcome = ?outcome, closed = ?closed, "Stage tracking finished");
        closed
    }

    /// Returns all descriptors in declared order.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Looks up a descriptor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageDescriptor> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns the currently active stage.
    #[must_use]
    pub fn active(&self) -> Option<&StageDescriptor> {
        self.stages.iter().find(|s| s.status == StageStatus::Active)
    }

    /// Returns the terminal outcome, if reached.
    #[must_use]
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    /// Returns true once a result or error has been applied.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    /// Returns the declared stage names in order.
    #[must_use]
    pub fn declared_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    /// Returns every stage to pending and clears the terminal state.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            *stage = StageDescriptor::pending(std::mem::take(&mut stage.name));
        }
        self.latest = None;
        self.outcome = None;
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    fn regression(&self, name: &str) -> RelayError {
        let latest = self
            .latest
            .map(|i| self.stages[i].name.clone())
            .unwrap_or_default();
        StageRegressionError::new(name, latest).into()
    }

    fn close_active(&mut self, status: StageStatus, now: Timestamp) -> Vec<String> {
        self.stages
            .iter_mut()
            .filter(|s| s.status == StageStatus::Active)
            .map(|s| {
                s.finish(status, now);
                s.name.clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::now_utc;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn research_machine() -> StageMachine {
        StageMachine::new(["planner", "web-search", "report-writer"])
    }

    fn statuses(machine: &StageMachine) -> Vec<StageStatus> {
        machine.stages().iter().map(|s| s.status).collect()
    }

    fn active_count(machine: &StageMachine) -> usize {
        machine
            .stages()
            .iter()
            .filter(|s| s.status == StageStatus::Active)
            .count()
    }

    #[test]
    fn test_new_is_all_pending() {
        let machine = research_machine();
        assert_eq!(statuses(&machine), vec![StageStatus::Pending; 3]);
        assert!(machine.active().is_none());
        assert!(!machine.is_terminal());
    }

    #[test]
    fn test_activation_completes_previous() {
        let mut machine = research_machine();
        let t0 = now_utc();
        let t1 = t0 + Duration::seconds(2);

        machine.activate("planner", t0).unwrap();
        let transition = machine.activate("web-search", t1).unwrap();

        assert_eq!(
            transition,
            Transition::Activated {
                stage: "web-search".into(),
                completed: vec!["planner".into()],
            }
        );
        let planner = machine.get("planner").unwrap();
        assert_eq!(planner.status, StageStatus::Completed);
        assert_eq!(planner.start_time, Some(t0));
        assert_eq!(planner.end_time, Some(t1));
        assert_eq!(machine.active().unwrap().name, "web-search");
    }

    #[test]
    fn test_result_after_two_stages() {
        let mut machine = research_machine();
        let now = now_utc();

        machine.activate("planner", now).unwrap();
        machine.activate("web-search", now).unwrap();
        let closed = machine.finish(RunOutcome::Completed, now);

        assert_eq!(closed, vec!["web-search".to_string()]);
        assert_eq!(
            statuses(&machine),
            vec![StageStatus::Completed, StageStatus::Completed, StageStatus::Pending]
        );
        assert!(machine.is_terminal());
    }

    #[test]
    fn test_error_marks_active_stage() {
        let mut machine = research_machine();
        let now = now_utc();

        machine.activate("planner", now).unwrap();
        machine.finish(RunOutcome::Failed, now);

        assert_eq!(machine.get("planner").unwrap().status, StageStatus::Error);
        assert_eq!(machine.outcome(), Some(RunOutcome::Failed));
    }

    #[test]
    fn test_unknown_stage_leaves_state_unchanged() {
        let mut machine = research_machine();
        let now = now_utc();
        machine.activate("planner", now).unwrap();
        let before = machine.stages().to_vec();

        let err = machine.activate("reviewer", now).unwrap_err();

        assert!(matches!(err, RelayError::UnknownStage(_)));
        assert_eq!(machine.stages(), before.as_slice());
    }

    #[test]
    fn test_reentry_refreshes_start_time() {
        let mut machine = research_machine();
        let t0 = now_utc();
        let t1 = t0 + Duration::seconds(5);

        machine.activate("planner", t0).unwrap();
        let transition = machine.activate("planner", t1).unwrap();

        assert_eq!(transition, Transition::Reentered { stage: "planner".into() });
        let planner = machine.get("planner").unwrap();
        assert_eq!(planner.status, StageStatus::Active);
        assert_eq!(planner.start_time, Some(t1));
        assert!(planner.end_time.is_none());
    }

    #[test]
    fn test_completed_stage_cannot_reactivate() {
        let mut machine = research_machine();
        let now = now_utc();
        machine.activate("planner", now).unwrap();
        machine.activate("web-search", now).unwrap();
        let before = machine.stages().to_vec();

        let err = machine.activate("planner", now).unwrap_err();

        assert!(matches!(err, RelayError::StageRegression(_)));
        assert_eq!(machine.stages(), before.as_slice());
    }

    #[test]
    fn test_skipped_stage_cannot_activate_late() {
        let mut machine = research_machine();
        let now = now_utc();
        machine.activate("web-search", now).unwrap();

        let err = machine.activate("planner", now).unwrap_err();

        assert!(err.to_string().contains("after 'web-search'"));
        assert_eq!(machine.get("planner").unwrap().status, StageStatus::Pending);
        assert_eq!(machine.active().unwrap().name, "web-search");
    }

    #[test]
    fn test_skipping_ahead_keeps_intermediate_pending() {
        let mut machine = research_machine();
        let now = now_utc();
        machine.activate("planner", now).unwrap();
        machine.activate("report-writer", now).unwrap();

        assert_eq!(
            statuses(&machine),
            vec![StageStatus::Completed, StageStatus::Pending, StageStatus::Active]
        );
    }

    #[test]
    fn test_no_stage_change_after_terminal() {
        let mut machine = research_machine();
        let now = now_utc();
        machine.finish(RunOutcome::Completed, now);

        let err = machine.activate("planner", now).unwrap_err();
        assert!(matches!(err, RelayError::RunTerminated { .. }));
        assert!(machine.finish(RunOutcome::Failed, now).is_empty());
        assert_eq!(machine.outcome(), Some(RunOutcome::Completed));
    }

    #[test]
    fn test_at_most_one_active_for_any_sequence() {
        let names = ["planner", "web-search", "report-writer", "reviewer"];
        let now = now_utc();
        // Every sequence of length 4 over the alphabet, including undeclared names.
        for a in names {
            for b in names {
                for c in names {
                    for d in names {
                        let mut machine = research_machine();
                        let mut last_index = None;
                        for name in [a, b, c, d] {
                            if let Ok(transition) = machine.activate(name, now) {
                                let index = machine
                                    .declared_names()
                                    .iter()
                                    .position(|n| n == transition.stage());
                                assert!(index >= last_index, "activation went backwards");
                                last_index = index;
                            }
                            assert!(active_count(&machine) <= 1);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_reset() {
        let mut machine = research_machine();
        let now = now_utc();
        machine.activate("planner", now).unwrap();
        machine.finish(RunOutcome::Completed, now);

        machine.reset();

        assert_eq!(statuses(&machine), vec![StageStatus::Pending; 3]);
        assert_eq!(machine.declared_names(), vec!["planner", "web-search", "report-writer"]);
        assert!(!machine.is_terminal());
        assert!(machine.activate("planner", now).is_ok());
    }
}
