//! Server-sent events of a streamed Messages API reply.
//!
//! Bytes arrive in arbitrary chunks, sometimes mid-character. `EventDecoder`
//! buffers them and hands out complete `event:`/`data:` blocks; `interpret`
//! keeps only the text and the end-of-message marker.

use serde::Deserialize;
use tracing::warn;

use super::LlmError;

/// One blank-line-terminated block of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event: String,
    pub data: String,
}

/// What generation sees of the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEvent {
    Delta(String),
    Stop,
}

#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: Vec<u8>,
}

impl EventDecoder {
    /// Adds `chunk` and returns every block it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((end, separator)) = block_boundary(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + separator).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                events.push(event);
            }
        }
        events
    }
}

/// Start and length of the first blank line (`\n\n` or `\r\n\r\n`).
fn block_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|i| {
        let rest = &buffer[i..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

fn parse_block(block: &str) -> Option<RawEvent> {
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();
    for line in block.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if event.is_empty() && data.is_empty() {
        return None;
    }
    Some(RawEvent {
        event,
        data: data.join("\n"),
    })
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Payload {
    ContentBlockDelta { delta: BlockDelta },
    MessageDelta { delta: MessageDelta },
    MessageStop,
    Error { error: ErrorDetail },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// `None` for bookkeeping events (`ping`, block start/stop, usage).
pub fn interpret(raw: &RawEvent) -> Result<Option<TextEvent>, LlmError> {
    if raw.data.is_empty() {
        return Ok(None);
    }
    let payload: Payload = serde_json::from_str(&raw.data)
        .map_err(|e| LlmError::Stream(format!("bad {} event: {e}", raw.event)))?;

    match payload {
        Payload::ContentBlockDelta {
            delta: BlockDelta::TextDelta { text },
        } => Ok(Some(TextEvent::Delta(text))),
        Payload::MessageDelta { delta } => {
            if delta.stop_reason.as_deref() == Some("max_tokens") {
                warn!("Model reply was cut off at the token limit");
            }
            Ok(None)
        }
        Payload::MessageStop => Ok(Some(TextEvent::Stop)),
        Payload::Error { error } => Err(LlmError::Stream(format!(
            "{}: {}",
            error.kind, error.message
        ))),
        Payload::ContentBlockDelta { .. } | Payload::Other => Ok(None),
    }
}
