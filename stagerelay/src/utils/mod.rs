//! Utility functions for run identifiers and timestamp handling.

pub mod timestamps;

pub use timestamps::{elapsed_ms, iso_timestamp, now_utc, Timestamp};

use uuid::Uuid;

/// Generates a new time-ordered run identifier (UUID v7).
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::now_v7()
}
