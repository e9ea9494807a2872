//! Raw runtime event records.

use serde::{Deserialize, Serialize};

/// An opaque event record as emitted by the agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(serde_json::Value);

impl RawEvent {
    /// Wraps a JSON value.
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Parses a record from a JSON line.
    pub fn from_json_str(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line).map(Self)
    }

    /// Returns the record's `type` field.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.str_field("type")
    }

    /// Returns the record's `subtype` field.
    #[must_use]
    pub fn subtype(&self) -> Option<&str> {
        self.str_field("subtype")
    }

    /// Returns a top-level string field.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns a top-level field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Returns the content blocks of a message record.
    #[must_use]
    pub fn content_blocks(&self) -> &[serde_json::Value] {
        self.0
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(serde_json::Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Returns the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Consumes the record, returning the JSON value.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for RawEvent {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let raw = RawEvent::new(serde_json::json!({
            "type": "assistant",
            "message": {"content": [{"type": "text", "text": "hi"}]}
        }));

        assert_eq!(raw.kind(), Some("assistant"));
        assert_eq!(raw.subtype(), None);
        assert_eq!(raw.content_blocks().len(), 1);
    }

    #[test]
    fn test_missing_content_is_empty() {
        let raw = RawEvent::new(serde_json::json!({"type": "assistant"}));
        assert!(raw.content_blocks().is_empty());
    }

    #[test]
    fn test_from_json_str() {
        let raw = RawEvent::from_json_str(r#"{"type":"status","message":"ok"}"#).unwrap();
        assert_eq!(raw.str_field("message"), Some("ok"));
        assert!(RawEvent::from_json_str("not json").is_err());
    }
}
