//! Core domain model types for stagerelay.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage and run status enums
//! - Stage descriptors and source records
//! - Normalized pipeline events and relay frames

mod descriptor;
mod event;
mod source;
mod status;

pub use descriptor::StageDescriptor;
pub use event::{PipelineEvent, RelayFrame};
pub use source::SourceRecord;
pub use status::{RunStatus, StageStatus};
