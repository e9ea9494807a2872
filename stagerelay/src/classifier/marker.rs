//! Stage announcement parsing.

use crate::errors::RelayError;
use regex::Regex;

/// Grammar of a stage name that can appear in a marker line.
const STAGE_NAME: &str = "[A-Za-z0-9][A-Za-z0-9_.-]*";

/// Returns true if `name` can be announced in a marker line: an ASCII letter
/// or digit followed by letters, digits, `_`, `.` or `-`.
#[must_use]
pub fn is_marker_stage_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Finds stage announcements such as `STAGE: web-search` in agent text.
///
/// A marker only counts when it sits on a line of its own; prose that merely
/// mentions a stage does not. The first marker in a block wins.
#[derive(Debug, Clone)]
pub struct StageMarkerParser {
    pattern: Regex,
}

impl StageMarkerParser {
    /// Builds a parser for the given marker prefix.
    pub fn new(prefix: &str) -> Result<Self, RelayError> {
        let source = format!(
            r"(?m)^[ \t]*{}[ \t]*({STAGE_NAME})[ \t]*\r?$",
            regex::escape(prefix.trim())
        );
        let pattern = Regex::new(&source)
            .map_err(|e| RelayError::Config(format!("invalid stage marker '{prefix}': {e}")))?;
        Ok(Self { pattern })
    }

    /// Returns the first announced stage in `text`.
    #[must_use]
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}
