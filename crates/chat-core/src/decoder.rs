//! Incremental decoder for the `data:`-framed completion stream.
//!
//! Wire format:
//! ```text
//! data: {"content":"Hel"}\n\n
//! data: {"content":"lo"}\n\n
//! data: [DONE]\n\n
//! ```
//! Errors arrive as `data: {"type":"error","message":"..."}`.
//!
//! Chunks may split a frame anywhere or carry several frames at once; the
//! decoder buffers the tail after the last boundary until more input arrives.

use serde::Deserialize;
use serde_json::Value;

const FRAME_SEPARATOR: &str = "\n\n";
const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const ERROR_KIND: &str = "error";

/// One decoded protocol unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Token(String),
    Done,
    Error(String),
}

impl Frame {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Done | Frame::Error(_))
    }
}

/// A dropped payload that failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub payload: String,
    pub error: String,
}

/// Loosely typed so that an error tag wins whatever shape `message` has.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<Value>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

/// Per-stream decoder state. Never shared between streams.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: String,
    finished: bool,
    diagnostics: Vec<Diagnostic>,
    error_fallback: String,
}

impl FrameDecoder {
    /// `error_fallback` is used for error frames that carry no message.
    pub fn new(error_fallback: impl Into<String>) -> Self {
        Self {
            buffer: String::new(),
            finished: false,
            diagnostics: Vec::new(),
            error_fallback: error_fallback.into(),
        }
    }

    /// True once a terminal frame has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Feed the next chunk and return every frame it completes.
    pub fn push(&mut self, chunk: &str) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }
        self.buffer.push_str(chunk);

        // Leftmost boundary first, so the result never depends on where the
        // transport happened to cut the stream.
        let mut consumed = 0;
        while let Some(pos) = self.buffer[consumed..].find(FRAME_SEPARATOR) {
            let segment_end = consumed + pos;
            let decoded = decode_segment(&self.buffer[consumed..segment_end], &self.error_fallback);
            consumed = segment_end + FRAME_SEPARATOR.len();
            if let Some(frame) = self.record(decoded) {
                let terminal = frame.is_terminal();
                frames.push(frame);
                if terminal {
                    self.finish_with_terminal();
                    return frames;
                }
            }
        }
        self.buffer.drain(..consumed);
        frames
    }

    /// Signal end of input. Decodes whatever is left in the buffer and
    /// guarantees exactly one terminal frame over the decoder's lifetime.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }
        let tail = std::mem::take(&mut self.buffer);
        let decoded = decode_segment(&tail, &self.error_fallback);
        if let Some(frame) = self.record(decoded) {
            frames.push(frame);
        }
        if !frames.last().is_some_and(Frame::is_terminal) {
            frames.push(Frame::Done);
        }
        self.finish_with_terminal();
        frames
    }

    fn record(&mut self, decoded: Option<Result<Frame, Diagnostic>>) -> Option<Frame> {
        match decoded? {
            Ok(frame) => Some(frame),
            Err(diagnostic) => {
                log::warn!(
                    "Dropping malformed stream payload ({}): {}",
                    diagnostic.error,
                    diagnostic.payload
                );
                self.diagnostics.push(diagnostic);
                None
            }
        }
    }

    fn finish_with_terminal(&mut self) {
        self.finished = true;
        self.buffer.clear();
    }
}

/// `None` for segments that produce nothing (non-`data:` lines, envelopes
/// without content), `Some(Err)` for payloads that fail to parse.
fn decode_segment(segment: &str, error_fallback: &str) -> Option<Result<Frame, Diagnostic>> {
    // Anything not tagged `data:` is a comment or keep-alive.
    let payload = segment.strip_prefix(DATA_PREFIX)?.trim();
    if payload == DONE_SENTINEL {
        return Some(Ok(Frame::Done));
    }

    let envelope = match serde_json::from_str::<Envelope>(payload) {
        Ok(envelope) => envelope,
        Err(e) => return Some(Err(malformed(payload, e.to_string()))),
    };

    if envelope.kind.as_ref().and_then(Value::as_str) == Some(ERROR_KIND) {
        let message = envelope
            .message
            .and_then(error_text)
            .unwrap_or_else(|| error_fallback.to_string());
        return Some(Ok(Frame::Error(message)));
    }

    match envelope.content {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => (!text.is_empty()).then(|| Ok(Frame::Token(text))),
        Some(other) => Some(Err(malformed(
            payload,
            format!("content is not a string: {}", other),
        ))),
    }
}

/// Text for an error frame. Non-string messages keep their JSON form.
fn error_text(message: Value) -> Option<String> {
    match message {
        Value::Null => None,
        Value::String(text) => (!text.is_empty()).then_some(text),
        other => Some(other.to_string()),
    }
}

fn malformed(payload: &str, error: String) -> Diagnostic {
    Diagnostic {
        payload: payload.to_string(),
        error,
    }
}
