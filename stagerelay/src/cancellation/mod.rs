//! Cooperative cancellation for relay runs.
//!
//! The consumer holds a clone of the run's [`CancellationToken`]; cancelling it
//! stops the relay, which then drops its upstream stream.

mod token;

pub use token::CancellationToken;
