//! Server-sent event codec for relay frames.
//!
//! Each event is written as
//!
//! ```text
//! event: <type>
//! data: <json>
//!
//! ```
//!
//! and the end-of-stream sentinel as `event: done` with `data: [DONE]`. The
//! sentinel cannot collide with a data event because every data payload is a
//! JSON object.

use crate::core::{PipelineEvent, RelayFrame};
use crate::errors::RelayError;
use tracing::{debug, warn};

/// Event name of the end-of-stream frame.
pub const DONE_EVENT: &str = "done";
/// Data payload of the end-of-stream frame.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Encodes one event as an SSE frame.
pub fn encode_event(event: &PipelineEvent) -> Result<String, RelayError> {
    let data = serde_json::to_string(event)?;
    Ok(format!("event: {}\ndata: {data}\n\n", event.event_type()))
}

/// Encodes a relay frame, including the sentinel.
pub fn encode_frame(frame: &RelayFrame) -> Result<String, RelayError> {
    match frame {
        RelayFrame::Event(event) => encode_event(event),
        RelayFrame::End => Ok(format!("event: {DONE_EVENT}\ndata: {DONE_SENTINEL}\n\n")),
    }
}

/// Incremental decoder for SSE text produced by [`encode_frame`].
///
/// Chunks may split frames anywhere. LF, CRLF and bare CR line endings are
/// accepted. Comment lines and unknown fields are ignored; frames after the
/// sentinel are discarded.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    ended: bool,
    skip_lf: bool,
}

impl SseDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame completed by it, in order.
    ///
    /// A block that fails to parse yields an `Err` item in its place; frames
    /// before and after it are still returned.
    pub fn push(&mut self, chunk: &str) -> Vec<Result<RelayFrame, RelayError>> {
        self.push_normalized(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if self.ended {
                debug!("Discarding SSE frame after end sentinel");
                continue;
            }
            match Self::parse_block(&block) {
                Ok(Some(frame)) => {
                    if frame.is_end() {
                        self.ended = true;
                    }
                    frames.push(Ok(frame));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "Undecodable SSE frame");
                    frames.push(Err(err));
                }
            }
        }
        frames
    }

    /// Appends `chunk` with CRLF and bare CR line endings rewritten to LF.
    ///
    /// A chunk ending in CR may be followed by the LF of the same CRLF pair.
    fn push_normalized(&mut self, mut chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if std::mem::take(&mut self.skip_lf) {
            chunk = chunk.strip_prefix('\n').unwrap_or(chunk);
        }
        self.skip_lf = chunk.ends_with('\r');
        if chunk.contains('\r') {
            self.buffer.push_str(&chunk.replace("\r\n", "\n").replace('\r', "\n"));
        } else {
            self.buffer.push_str(chunk);
        }
    }

    /// Returns true once the sentinel has been decoded.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Returns true if a partial frame is buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.trim().is_empty()
    }

    fn parse_block(block: &str) -> Result<Option<RelayFrame>, RelayError> {
        let mut event_name = None;
        let mut data_lines = Vec::new();

        for line in block.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => event_name = Some(value),
                "data" => data_lines.push(value),
                _ => {}
            }
        }

        if data_lines.is_empty() {
            return Ok(None);
        }
        let data = data_lines.join("\n");
        if data == DONE_SENTINEL || event_name == Some(DONE_EVENT) {
            return Ok(Some(RelayFrame::End));
        }
        let event: PipelineEvent = serde_json::from_str(&data)?;
        Ok(Some(RelayFrame::Event(event)))
    }
}
