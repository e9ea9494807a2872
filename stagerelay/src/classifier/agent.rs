//! Classifier for agent SDK message records.

use super::{EventClassifier, RawEvent, StageMarkerParser};
use crate::config::RelayConfig;
use crate::core::{PipelineEvent, SourceRecord};
use crate::errors::{RelayError, UnrecognizedEventError};
use std::collections::HashSet;

/// Classifies the records emitted by a hosted agent SDK.
///
/// Recognized shapes, by `type`:
///
/// | record | event |
/// |---|---|
/// | `stage_change` with `stage` | `stage_change` |
/// | `assistant` text containing a marker line | `stage_change` |
/// | `assistant` with a `tool_use` block | `tool_use` |
/// | `assistant` with plain text | `status` |
/// | `user` whose `tool_result` holds url-bearing results | `sources` |
/// | `tool_result` from a configured search tool | `sources` |
/// | `sources` with a `sources` list | `sources` |
/// | `system` | `status` |
/// | `status` with `message` | `status` |
/// | `result`, successful | `result` |
/// | `result` with an error subtype or `is_error` | `error` |
/// | `error` | `error` |
///
/// An assistant message yields one event: a marker beats a tool call, which
/// beats plain text.
#[derive(Debug, Clone)]
pub struct AgentEventClassifier {
    markers: StageMarkerParser,
    source_tools: HashSet<String>,
}

impl AgentEventClassifier {
    /// Builds a classifier from the relay configuration.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        Ok(Self {
            markers: StageMarkerParser::new(&config.stage_marker)?,
            source_tools: config.source_tools.iter().cloned().collect(),
        })
    }

    fn unrecognized(raw: &RawEvent, reason: impl Into<String>) -> RelayError {
        UnrecognizedEventError::new(reason, raw.as_value().clone()).into()
    }

    fn classify_assistant(&self, raw: &RawEvent) -> Result<PipelineEvent, RelayError> {
        let blocks = raw.content_blocks();
        let texts: Vec<&str> = blocks
            .iter()
            .filter(|b| block_type(b) == Some("text"))
            .filter_map(|b| b.get("text").and_then(serde_json::Value::as_str))
            .collect();

        if let Some(stage) = texts.iter().find_map(|t| self.markers.find(*t)) {
            return Ok(PipelineEvent::stage_change(stage));
        }

        if let Some(tool) = blocks.iter().find(|b| block_type(b) == Some("tool_use")) {
            let name = tool
                .get("name")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| Self::unrecognized(raw, "tool_use block without a name"))?;
            return Ok(PipelineEvent::ToolUse {
                tool: name.to_string(),
                input: tool.get("input").cloned().unwrap_or(serde_json::Value::Null),
            });
        }

        let text = texts.join("\n");
        if text.trim().is_empty() {
            return Err(Self::unrecognized(raw, "assistant message without text or tool use"));
        }
        Ok(PipelineEvent::status(text))
    }

    fn classify_user(raw: &RawEvent) -> Result<PipelineEvent, RelayError> {
        let blocks = raw.content_blocks();
        let tool_results: Vec<&serde_json::Value> = blocks
            .iter()
            .filter(|b| block_type(b) == Some("tool_result"))
            .collect();
        if tool_results.is_empty() {
            return Err(Self::unrecognized(raw, "user message without tool results"));
        }

        let mut sources = Vec::new();
        for content in tool_results.iter().filter_map(|b| b.get("content")) {
            // Any tool may answer here; only url-bearing lists are sources.
            if let Some(items) = result_items(content) {
                sources.extend(parse_source_items(&items).map_err(|e| Self::unrecognized(raw, e))?);
            }
        }

        if sources.is_empty() {
            return Ok(PipelineEvent::status("tool result received"));
        }
        Ok(PipelineEvent::Sources { sources })
    }

    fn classify_tool_result(&self, raw: &RawEvent) -> Result<PipelineEvent, RelayError> {
        let tool = raw.str_field("tool").unwrap_or_default();
        if !self.source_tools.contains(tool) {
            return Ok(PipelineEvent::status(format!("tool result from '{tool}'")));
        }
        let content = raw
            .field("content")
            .ok_or_else(|| Self::unrecognized(raw, format!("tool result from '{tool}' without content")))?;
        let sources = strict_sources(content)
            .map_err(|e| Self::unrecognized(raw, format!("tool result from '{tool}': {e}")))?;
        Ok(PipelineEvent::Sources { sources })
    }

    fn classify_result(raw: &RawEvent) -> PipelineEvent {
        let subtype = raw.subtype().unwrap_or("success");
        let is_error = raw
            .field("is_error")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        if is_error || subtype.starts_with("error") {
            let detail = raw
                .field("errors")
                .and_then(serde_json::Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(serde_json::Value::as_str)
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|s| !s.is_empty())
                .or_else(|| raw.str_field("result").map(String::from))
                .unwrap_or_else(|| subtype.to_string());
            return PipelineEvent::error(detail);
        }

        PipelineEvent::result(raw.str_field("result").unwrap_or_default())
    }
}

impl EventClassifier for AgentEventClassifier {
    fn classify(&self, raw: &RawEvent) -> Result<PipelineEvent, RelayError> {
        let Some(kind) = raw.kind() else {
            return Err(Self::unrecognized(raw, "record has no type"));
        };

        match kind {
            "stage_change" => raw
                .str_field("stage")
                .map(PipelineEvent::stage_change)
                .ok_or_else(|| Self::unrecognized(raw, "stage_change without stage")),
            "assistant" => self.classify_assistant(raw),
            "user" => Self::classify_user(raw),
            "tool_result" => self.classify_tool_result(raw),
            "sources" => {
                let payload = raw
                    .field("sources")
                    .ok_or_else(|| Self::unrecognized(raw, "sources record without sources"))?;
                let sources = strict_sources(payload)
                    .map_err(|e| Self::unrecognized(raw, format!("sources record: {e}")))?;
                Ok(PipelineEvent::Sources { sources })
            }
            "system" => Ok(PipelineEvent::status(format!(
                "system: {}",
                raw.subtype().unwrap_or("event")
            ))),
            "status" => raw
                .str_field("message")
                .map(PipelineEvent::status)
                .ok_or_else(|| Self::unrecognized(raw, "status without message")),
            "result" => Ok(Self::classify_result(raw)),
            "error" => Ok(PipelineEvent::error(
                raw.str_field("message")
                    .or_else(|| raw.str_field("error"))
                    .unwrap_or("agent reported an error"),
            )),
            other => Err(Self::unrecognized(raw, format!("unknown type '{other}'"))),
        }
    }
}

fn block_type(block: &serde_json::Value) -> Option<&str> {
    block.get("type").and_then(serde_json::Value::as_str)
}

/// Locates the list of result items in a tool payload.
///
/// Accepts a list, an object with a `results` or `sources` list, a JSON string
/// holding either, or a list of text blocks whose text is such a string.
/// Returns `None` when the payload holds no such list.
fn result_items(content: &serde_json::Value) -> Option<Vec<serde_json::Value>> {
    match content {
        serde_json::Value::String(text) => serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|parsed| result_items(&parsed)),
        serde_json::Value::Array(items)
            if !items.is_empty() && items.iter().all(|i| block_type(i) == Some("text")) =>
        {
            let mut found: Option<Vec<serde_json::Value>> = None;
            for text in items.iter().filter_map(|b| b.get("text")) {
                if let Some(list) = result_items(text) {
                    found.get_or_insert_with(Vec::new).extend(list);
                }
            }
            found
        }
        serde_json::Value::Array(items) => Some(items.clone()),
        serde_json::Value::Object(map) => map
            .get("results")
            .or_else(|| map.get("sources"))
            .and_then(result_items),
        _ => None,
    }
}

/// Deserializes every url-bearing item; items without a locator are skipped.
fn parse_source_items(items: &[serde_json::Value]) -> Result<Vec<SourceRecord>, String> {
    items
        .iter()
        .filter(|item| item.get("url").is_some() || item.get("locator").is_some())
        .map(|item| {
            serde_json::from_value::<SourceRecord>(item.clone())
                .map_err(|e| format!("malformed source record {item}: {e}"))
        })
        .collect()
}

/// Extracts sources from a payload that must be a source list.
fn strict_sources(payload: &serde_json::Value) -> Result<Vec<SourceRecord>, String> {
    let items = result_items(payload).ok_or_else(|| "payload is not a list of sources".to_string())?;
    let sources = parse_source_items(&items)?;
    if sources.is_empty() && !items.is_empty() {
        return Err("no item carries a url".to_string());
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn classifier() -> AgentEventClassifier {
        AgentEventClassifier::from_config(&RelayConfig::default()).unwrap()
    }

    fn classify(value: serde_json::Value) -> Result<PipelineEvent, RelayError> {
        classifier().classify(&RawEvent::new(value))
    }

    fn assistant_text(text: &str) -> serde_json::Value {
        json!({"type": "assistant", "message": {"content": [{"type": "text", "text": text}]}})
    }

    #[test]
    fn test_structured_stage_change() {
        let event = classify(json!({"type": "stage_change", "stage": "planner"})).unwrap();
        assert_eq!(event, PipelineEvent::stage_change("planner"));
    }

    #[test]
    fn test_marker_in_assistant_text() {
        let event = classify(assistant_text("Plan ready.\nSTAGE: web-search\nSearching now.")).unwrap();
        assert_eq!(event, PipelineEvent::stage_change("web-search"));
    }

    #[test]
    fn test_plain_assistant_text_is_status() {
        let event = classify(assistant_text("Thinking about the stage layout")).unwrap();
        assert_eq!(event, PipelineEvent::status("Thinking about the stage layout"));
    }

    #[test]
    fn test_tool_use() {
        let event = classify(json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "text", "text": "Let me search."},
                {"type": "tool_use", "id": "t1", "name": "web_search", "input": {"query": "rust"}}
            ]}
        }))
        .unwrap();

        assert_eq!(
            event,
            PipelineEvent::ToolUse {
                tool: "web_search".into(),
                input: json!({"query": "rust"}),
            }
        );
    }

    #[test]
    fn test_marker_beats_tool_use() {
        let event = classify(json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "tool_use", "name": "web_search", "input": {}},
                {"type": "text", "text": "STAGE: web-search"}
            ]}
        }))
        .unwrap();
        assert_eq!(event.event_type(), "stage_change");
    }

    #[test]
    fn test_user_tool_result_with_json_string() {
        let payload = json!({"results": [
            {"url": "https://a.example", "title": "A", "author": "Ann"},
            {"url": "https://b.example", "title": "B"}
        ]})
        .to_string();

        let event = classify(json!({
            "type": "user",
            "message": {"content": [{"type": "tool_result", "tool_use_id": "t1", "content": payload}]}
        }))
        .unwrap();

        match event {
            PipelineEvent::Sources { sources } => {
                assert_eq!(sources.len(), 2);
                assert_eq!(sources[0].author.as_deref(), Some("Ann"));
            }
            other => panic!("expected sources, got {other:?}"),
        }
    }

    #[test]
    fn test_user_tool_result_text_blocks() {
        let inner = json!([{"url": "https://c.example", "title": "C"}]).to_string();
        let event = classify(json!({
            "type": "user",
            "message": {"content": [{"type": "tool_result", "content": [{"type": "text", "text": inner}]}]}
        }))
        .unwrap();

        assert_eq!(
            event,
            PipelineEvent::Sources {
                sources: vec![SourceRecord::new("https://c.example", "C")]
            }
        );
    }

    #[test]
    fn test_user_tool_result_without_sources_is_status() {
        let event = classify(json!({
            "type": "user",
            "message": {"content": [{"type": "tool_result", "content": "file written"}]}
        }))
        .unwrap();
        assert_eq!(event, PipelineEvent::status("tool result received"));
    }

    #[test]
    fn test_flat_tool_result_respects_source_tools() {
        let content = json!([{"url": "https://d.example", "title": "D"}]);

        let from_search = classify(json!({"type": "tool_result", "tool": "web_search", "content": content})).unwrap();
        assert_eq!(from_search.event_type(), "sources");

        let from_other = classify(json!({"type": "tool_result", "tool": "calculator", "content": content})).unwrap();
        assert_eq!(from_other.event_type(), "status");
    }

    #[test]
    fn test_result_success() {
        let event = classify(json!({"type": "result", "subtype": "success", "result": "# Report"})).unwrap();
        assert_eq!(event, PipelineEvent::result("# Report"));
    }

    #[test]
    fn test_result_error_subtype() {
        let event = classify(json!({
            "type": "result",
            "subtype": "error_max_turns",
            "is_error": true,
            "errors": ["turn limit reached"]
        }))
        .unwrap();
        assert_eq!(event, PipelineEvent::error("turn limit reached"));

        let bare = classify(json!({"type": "result", "subtype": "error_during_execution"})).unwrap();
        assert_eq!(bare, PipelineEvent::error("error_during_execution"));
    }

    #[test]
    fn test_system_and_status() {
        assert_eq!(
            classify(json!({"type": "system", "subtype": "init"})).unwrap(),
            PipelineEvent::status("system: init")
        );
        assert_eq!(
            classify(json!({"type": "status", "message": "queued"})).unwrap(),
            PipelineEvent::status("queued")
        );
    }

    #[test]
    fn test_error_record() {
        assert_eq!(
            classify(json!({"type": "error", "message": "rate limited"})).unwrap(),
            PipelineEvent::error("rate limited")
        );
    }

    #[test]
    fn test_unrecognized_preserves_raw() {
        let raw = json!({"type": "telemetry", "cpu": 0.4});
        let err = classify(raw.clone()).unwrap_err();

        match err {
            RelayError::UnrecognizedEvent(inner) => {
                assert_eq!(inner.raw, raw);
                assert!(inner.reason.contains("telemetry"));
            }
            other => panic!("expected unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_is_unrecognized() {
        assert!(matches!(
            classify(json!({"hello": "world"})),
            Err(RelayError::UnrecognizedEvent(_))
        ));
        assert!(matches!(classify(json!(42)), Err(RelayError::UnrecognizedEvent(_))));
    }

    #[test]
    fn test_classification_is_pure() {
        let classifier = classifier();
        let raw = RawEvent::new(assistant_text("STAGE: planner"));
        assert_eq!(classifier.classify(&raw).unwrap(), classifier.classify(&raw).unwrap());
    }

    #[test]
    fn test_sources_record_with_wrong_shape_is_unrecognized() {
        let err = classify(json!({"type": "sources", "sources": "not-a-list"})).unwrap_err();
        match err {
            RelayError::UnrecognizedEvent(inner) => {
                assert!(inner.reason.contains("not a list"));
                assert_eq!(inner.raw["sources"], "not-a-list");
            }
            other => panic!("expected unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_source_item_is_unrecognized() {
        let err = classify(json!({"type": "sources", "sources": [{"url": 42, "title": "x"}]})).unwrap_err();
        assert!(matches!(err, RelayError::UnrecognizedEvent(ref inner) if inner.reason.contains("malformed")));

        let from_tool = classify(json!({
            "type": "tool_result",
            "tool": "web_search",
            "content": [{"url": ["a"], "title": "x"}]
        }));
        assert!(matches!(from_tool, Err(RelayError::UnrecognizedEvent(_))));

        let from_user = classify(json!({
            "type": "user",
            "message": {"content": [{"type": "tool_result", "content": [{"url": null}]}]}
        }));
        assert!(matches!(from_user, Err(RelayError::UnrecognizedEvent(_))));
    }

    #[test]
    fn test_source_tool_prose_is_unrecognized() {
        let err = classify(json!({"type": "tool_result", "tool": "web_search", "content": "no results today"}));
        assert!(matches!(err, Err(RelayError::UnrecognizedEvent(_))));

        let no_urls = classify(json!({"type": "sources", "sources": [{"title": "untitled"}]}));
        assert!(matches!(no_urls, Err(RelayError::UnrecognizedEvent(_))));
    }

    #[test]
    fn test_empty_source_list_is_an_empty_batch() {
        let event = classify(json!({"type": "sources", "sources": []})).unwrap();
        assert_eq!(event, PipelineEvent::Sources { sources: vec![] });
    }
}
