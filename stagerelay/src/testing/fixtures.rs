//! Scripted upstream fixtures.

use crate::classifier::RawEvent;
use futures::stream::{self, Stream};
use serde_json::{json, Value};

/// One scripted upstream item.
#[derive(Debug, Clone)]
enum ScriptItem {
    Record(Value),
    Fault(String),
}

/// Builds a fake agent runtime stream from SDK-shaped records.
///
/// ```rust
/// use stagerelay::testing::ScriptedUpstream;
///
/// let upstream = ScriptedUpstream::new()
///     .stage("planner")
///     .text("planning")
///     .result("done");
/// assert_eq!(upstream.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedUpstream {
    items: Vec<ScriptItem>,
}

impl ScriptedUpstream {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a structured stage change record.
    #[must_use]
    pub fn stage(self, name: &str) -> Self {
        self.raw(json!({"type": "stage_change", "stage": name}))
    }

    /// Adds an assistant message holding `STAGE: <name>` on its own line.
    #[must_use]
    pub fn marker(self, name: &str) -> Self {
        self.text(&format!("Moving on.\nSTAGE: {name}"))
    }

    /// Adds an assistant text message.
    #[must_use]
    pub fn text(self, text: &str) -> Self {
        self.raw(json!({
            "type": "assistant",
            "message": {"content": [{"type": "text", "text": text}]}
        }))
    }

    /// Adds an assistant tool call.
    #[must_use]
    pub fn tool_use(self, tool: &str, input: Value) -> Self {
        self.raw(json!({
            "type": "assistant",
            "message": {"content": [{"type": "tool_use", "id": "toolu_1", "name": tool, "input": input}]}
        }))
    }

    /// Adds a tool result carrying search hits as `(url, title)` pairs.
    #[must_use]
    pub fn search_results(self, hits: &[(&str, &str)]) -> Self {
        let results: Vec<Value> = hits
            .iter()
            .map(|(url, title)| json!({"url": url, "title": title}))
            .collect();
        self.raw(json!({
            "type": "user",
            "message": {"content": [{
                "type": "tool_result",
                "tool_use_id": "toolu_1",
                "content": [{"type": "text", "text": json!({"results": results}).to_string()}]
            }]}
        }))
    }

    /// Adds a successful result record.
    #[must_use]
    pub fn result(self, report: &str) -> Self {
        self.raw(json!({"type": "result", "subtype": "success", "result": report}))
    }

    /// Adds an error record.
    #[must_use]
    pub fn error(self, message: &str) -> Self {
        self.raw(json!({"type": "error", "message": message}))
    }

    /// Adds an arbitrary record.
    #[must_use]
    pub fn raw(mut self, record: Value) -> Self {
        self.items.push(ScriptItem::Record(record));
        self
    }

    /// Makes the stream fail at this point.
    #[must_use]
    pub fn fault(mut self, message: &str) -> Self {
        self.items.push(ScriptItem::Fault(message.to_string()));
        self
    }

    /// Returns the number of scripted items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is scripted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Converts the script into an upstream stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<RawEvent, anyhow::Error>> + Send + 'static {
        stream::iter(self.items.into_iter().map(|item| match item {
            ScriptItem::Record(value) => Ok(RawEvent::new(value)),
            ScriptItem::Fault(message) => Err(anyhow::anyhow!(message)),
        }))
    }
}
