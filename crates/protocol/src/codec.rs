//! Wire codec for `text/event-stream` bodies.
//!
//! - [`encode`] -- render a [`Frame`] as `event:` + `data:` lines and a blank line
//! - [`FrameDecoder`] -- incremental decoder fed with arbitrary body chunks

use serde_json::Value;

use crate::frame::Frame;

/// Name used when a block carries no `event:` line.
const DEFAULT_EVENT: &str = "message";

/// Encode a frame for the wire.
///
/// The payload is serialized as compact JSON, which escapes any newline in
/// string values, so the frame always occupies exactly two lines.
pub fn encode(frame: &Frame) -> String {
    let data = serde_json::to_string(frame.data()).unwrap_or_else(|_| "null".into());
    format!("event: {}\ndata: {}\n\n", frame.event(), data)
}

/// Parse a `data:` value as JSON, falling back to the raw text.
///
/// Decoding never fails: a malformed payload is delivered as a JSON string.
pub fn decode_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Incremental decoder for a `text/event-stream` body.
///
/// Chunks may split frames, lines, or even multi-byte characters at any
/// position; incomplete input stays buffered until the next push.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes and return every frame completed by them.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(bytes);
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete sequence at the end: keep it for the next chunk.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let head: Vec<u8> = self.pending.drain(..complete).collect();
        let text = String::from_utf8_lossy(&head);
        self.push(&text)
    }

    /// Feed decoded text and return every frame completed by it.
    pub fn push(&mut self, text: &str) -> Vec<Frame> {
        self.buffer.push_str(text);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos).collect();
            self.buffer.drain(..2);
            if let Some(frame) = parse_block(&block) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a final block that was never terminated by a blank line.
    pub fn finish(&mut self) -> Option<Frame> {
        self.pending.clear();
        let block = std::mem::take(&mut self.buffer);
        if block.trim().is_empty() {
            return None;
        }
        parse_block(block.trim_end_matches('\n'))
    }
}

/// Parse one event block.  Blocks without a `data:` line dispatch nothing.
fn parse_block(block: &str) -> Option<Frame> {
    let mut event: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value),
            "data" => data_lines.push(value),
            // id, retry, and unknown fields carry nothing we route on.
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    let name = match event {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_EVENT,
    };
    Some(Frame::from_parts(
        name.to_string(),
        decode_payload(&data_lines.join("\n")),
    ))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
