//! Relay configuration.
//!
//! `RelayConfig` declares the stage list for a run, the marker syntax the
//! agent uses to announce stages, the tools whose results carry sources, and
//! the output channel capacity. It can be built in code, parsed from JSON, or
//! read from `STAGERELAY_*` environment variables.

use crate::classifier::is_marker_stage_name;
use crate::errors::RelayError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Environment variable holding a comma-separated stage list.
pub const ENV_STAGES: &str = "STAGERELAY_STAGES";
/// Environment variable overriding the stage marker prefix.
pub const ENV_STAGE_MARKER: &str = "STAGERELAY_STAGE_MARKER";
/// Environment variable overriding the channel capacity.
pub const ENV_CHANNEL_CAPACITY: &str = "STAGERELAY_CHANNEL_CAPACITY";

/// Configuration for a relay run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Declared stages, in activation order.
    #[serde(default = "default_stages")]
    pub stages: Vec<String>,
    /// Prefix of a stage announcement line in agent text.
    #[serde(default = "default_stage_marker")]
    pub stage_marker: String,
    /// Tool names whose results are parsed for sources.
    #[serde(default = "default_source_tools")]
    pub source_tools: Vec<String>,
    /// Bounded capacity of the output channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_stages() -> Vec<String> {
    ["planner", "web-search", "report-writer"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_stage_marker() -> String {
    "STAGE:".to_string()
}

fn default_source_tools() -> Vec<String> {
    vec!["web_search".to_string(), "mcp__exa__search".to_string()]
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            stage_marker: default_stage_marker(),
            source_tools: default_source_tools(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl RelayConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the declared stages.
    #[must_use]
    pub fn with_stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages = stages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the stage marker prefix.
    #[must_use]
    pub fn with_stage_marker(mut self, marker: impl Into<String>) -> Self {
        self.stage_marker = marker.into();
        self
    }

    /// Adds a tool whose results carry sources.
    #[must_use]
    pub fn with_source_tool(mut self, tool: impl Into<String>) -> Self {
        self.source_tools.push(tool.into());
        self
    }

    /// Sets the channel capacity.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, RelayError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from `STAGERELAY_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(stages) = lookup(ENV_STAGES) {
            config.stages = stages
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(marker) = lookup(ENV_STAGE_MARKER) {
            config.stage_marker = marker;
        }
        if let Some(capacity) = lookup(ENV_CHANNEL_CAPACITY) {
            config.channel_capacity = capacity.trim().parse().map_err(|_| {
                RelayError::Config(format!("{ENV_CHANNEL_CAPACITY} must be a positive integer, got '{capacity}'"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for contract violations.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.stages.is_empty() {
            return Err(RelayError::Config("at least one stage must be declared".to_string()));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.trim().is_empty() {
                return Err(RelayError::Config("stage names must not be blank".to_string()));
            }
            if !is_marker_stage_name(stage) {
                return Err(RelayError::Config(format!(
                    "stage '{stage}' cannot be announced in a marker line; \
                     use ASCII letters, digits, '_', '.' or '-' without spaces"
                )));
            }
            if !seen.insert(stage.as_str()) {
                return Err(RelayError::Config(format!("stage '{stage}' is declared twice")));
            }
        }

        if self.stage_marker.trim().is_empty() {
            return Err(RelayError::Config("stage marker must not be blank".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(RelayError::Config("channel capacity must be at least 1".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.stages, vec!["planner", "web-search", "report-writer"]);
        assert_eq!(config.stage_marker, "STAGE:");
        assert_eq!(config.channel_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RelayConfig::new()
            .with_stages(["outline", "draft"])
            .with_stage_marker("PHASE:")
            .with_source_tool("brave_search")
            .with_channel_capacity(8);

        assert_eq!(config.stages, vec!["outline", "draft"]);
        assert_eq!(config.stage_marker, "PHASE:");
        assert!(config.source_tools.contains(&"brave_search".to_string()));
        assert_eq!(config.channel_capacity, 8);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = RelayConfig::from_json_str(r#"{"stages": ["a", "b"]}"#).unwrap();
        assert_eq!(config.stages, vec!["a", "b"]);
        assert_eq!(config.stage_marker, "STAGE:");
    }

    #[test]
    fn test_from_json_rejects_duplicates() {
        let err = RelayConfig::from_json_str(r#"{"stages": ["a", "a"]}"#).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_from_json_rejects_bad_json() {
        let err = RelayConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, RelayError::Serialization(_)));
    }

    #[test]
    fn test_validate_rejects_empty_and_zero_capacity() {
        assert!(RelayConfig::new().with_stages(Vec::<String>::new()).validate().is_err());
        assert!(RelayConfig::new().with_channel_capacity(0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unannounceable_names() {
        for name in ["report writer", "Stage 2", " planner", "planner ", "étape"] {
            let err = RelayConfig::new().with_stages(["outline", name]).validate().unwrap_err();
            assert!(matches!(err, RelayError::Config(_)), "{name:?}");
            assert!(err.to_string().contains("marker line"), "{name:?}");
        }
        assert!(RelayConfig::new().with_stages(["v2.draft", "step_1"]).validate().is_ok());
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        let config = RelayConfig::from_env().ok();
        let expected = RelayConfig::from_lookup(|key| std::env::var(key).ok()).ok();
        assert_eq!(config, expected);
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_STAGES, "research, write ,"),
            (ENV_CHANNEL_CAPACITY, "16"),
        ]);
        let config = RelayConfig::from_lookup(|key| env.get(key).map(|v| (*v).to_string())).unwrap();

        assert_eq!(config.stages, vec!["research", "write"]);
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.stage_marker, "STAGE:");
    }

    #[test]
    fn test_from_lookup_bad_capacity() {
        let err = RelayConfig::from_lookup(|key| {
            (key == ENV_CHANNEL_CAPACITY).then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("STAGERELAY_CHANNEL_CAPACITY"));
    }
}
