//! Testing utilities for relay runs.
//!
//! This module provides:
//! - A scripted upstream that emits SDK-shaped records and faults
//! - Assertions over pipeline state and forwarded events

mod assertions;
mod fixtures;

pub use assertions::{
    assert_ends_with_error, assert_single_active, assert_sources_unique, assert_stage_statuses,
    assert_stage_timed, event_types,
};
pub use fixtures::ScriptedUpstream;
