//! Test assertions for relay state and output.

use crate::core::{PipelineEvent, StageStatus};
use crate::relay::PipelineState;

/// Asserts that at most one stage is active.
pub fn assert_single_active(state: &PipelineState) {
    let active: Vec<&str> = state
        .stages()
        .iter()
        .filter(|s| s.status == StageStatus::Active)
        .map(|s| s.name.as_str())
        .collect();
    assert!(active.len() <= 1, "Expected at most one active stage, got {active:?}");
}

/// Asserts the status of every declared stage, in order.
pub fn assert_stage_statuses(state: &PipelineState, expected: &[StageStatus]) {
    let actual: Vec<StageStatus> = state.stages().iter().map(|s| s.status).collect();
    assert_eq!(actual, expected, "Stage statuses differ");
}

/// Asserts that a finished stage has both timestamps and a sane duration.
pub fn assert_stage_timed(state: &PipelineState, name: &str) {
    let stage = state
        .stage(name)
        .unwrap_or_else(|| panic!("Unknown stage '{name}'"));
    assert!(stage.start_time.is_some(), "Stage '{name}' never started");
    assert!(stage.end_time.is_some(), "Stage '{name}' never ended");
    assert!(stage.start_time <= stage.end_time, "Stage '{name}' ended before it started");
}

/// Returns the `type` tags of the events, in order.
#[must_use]
pub fn event_types(events: &[PipelineEvent]) -> Vec<&'static str> {
    events.iter().map(PipelineEvent::event_type).collect()
}

/// Asserts that no two forwarded source batches share a locator.
pub fn assert_sources_unique(events: &[PipelineEvent]) {
    let mut seen = std::collections::HashSet::new();
    for event in events {
        if let PipelineEvent::Sources { sources } = event {
            for source in sources {
                assert!(
                    seen.insert(source.dedup_key().to_string()),
                    "Source '{}' forwarded twice",
                    source.locator
                );
            }
        }
    }
}

/// Asserts that the last event is an error.
pub fn assert_ends_with_error(events: &[PipelineEvent]) {
    match events.last() {
        Some(PipelineEvent::Error { .. }) => {}
        other => panic!("Expected a trailing error event, got {other:?}"),
    }
}
