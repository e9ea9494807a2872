//! Source accumulation.

mod dedup;

pub use dedup::SourceDeduplicator;
