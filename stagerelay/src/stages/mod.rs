//! Stage progression tracking.
//!
//! A run declares its stages up front; the [`StageMachine`] then moves them
//! through pending, active and completed as stage changes arrive.

mod machine;

pub use machine::{RunOutcome, StageMachine, Transition};
