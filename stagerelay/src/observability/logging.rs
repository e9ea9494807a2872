//! Structured logging setup.
//!
//! The relay logs through `tracing`; applications embedding it call one of the
//! initializers below once at startup.
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG or TRACE; defaults to INFO
//! - `LOG_FORMAT`: json, pretty or compact; defaults to json
//! - `RUST_LOG`: overrides the level filter entirely

use crate::errors::RelayError;
use std::env;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line terminal output.
    Compact,
}

impl LogFormat {
    /// Parses a format name; unknown names fall back to JSON.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }
}

/// Parses a level name; unknown names fall back to INFO.
#[must_use]
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

fn build_filter(level: Level) -> EnvFilter {
    // RUST_LOG wins when it parses.
    if let Ok(filter) = EnvFilter::try_from_env("RUST_LOG") {
        return filter;
    }
    let base = EnvFilter::new(level.to_string());
    match "tokio=warn".parse() {
        Ok(directive) => base.add_directive(directive),
        Err(_) => base,
    }
}

/// Installs the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(level: Level, format: LogFormat) -> Result<(), RelayError> {
    let subscriber = tracing_subscriber::registry().with(build_filter(level));

    let installed = match format {
        LogFormat::Json => subscriber.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => subscriber.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
    };
    installed.map_err(|e| RelayError::Config(format!("logging already initialized: {e}")))
}

/// Installs the global subscriber from `LOG_LEVEL` and `LOG_FORMAT`.
pub fn init_default_logging() -> Result<(), RelayError> {
    let level = env::var("LOG_LEVEL").map_or(Level::INFO, |v| parse_level(&v));
    let format = env::var("LOG_FORMAT").map_or(LogFormat::Json, |v| LogFormat::parse(&v));
    init_logging(level, format)
}
