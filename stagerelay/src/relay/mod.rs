//! Stream relay: per-run state, the relay loop and its consumer side.

mod metrics;
mod output;
mod runner;
mod state;


pub use metrics::RelayMetrics;
pub use output::RelayStream;
pub use runner::{RelayHandle, RelayOutcome, RelayTask, RunReport, StreamRelay};
pub use state::{PipelineSnapshot, PipelineState};
