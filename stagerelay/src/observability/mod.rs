//! Observability utilities.

mod logging;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};
