//! Server-sent event frame decoder.
//!
//! The transport hands over bytes at arbitrary boundaries. The decoder keeps
//! the unterminated tail of the previous read and only interprets complete
//! lines, so the decoded event sequence does not depend on how the stream
//! was split. Lines are cut at the byte level before UTF-8 decoding, which
//! also reassembles multi-byte characters that straddle two reads.
//!
//! Each useful line looks like `data: {"chunk": "..."}` or
//! `data: {"error": "..."}`. Other event-stream fields and comments are
//! ignored. A body whose lines are neither is not an event stream at all
//! (an HTML error page, a JSON body) and `decode_stream` reports it.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;

/// Prefix of a data line.
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Field names that may start an event-stream line.
const FIELD_PREFIXES: [&[u8]; 4] = [b"data:", b"event:", b"id:", b"retry:"];

/// A decoded protocol unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of the assistant reply, to be appended in arrival order.
    Chunk(String),
    /// The server gave up on this reply. Nothing useful follows.
    ErrorSignal(String),
}

enum Line {
    Event(StreamEvent),
    Ignored,
    Malformed,
    /// Not event-stream syntax.
    Foreign,
}

/// Incremental, single-use decoder for one response stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    residue: Vec<u8>,
    finished: bool,
    malformed: usize,
    data_lines: usize,
    foreign_lines: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next transport read and return the events it completed.
    ///
    /// After an `ErrorSignal` the decoder is finished and ignores any
    /// further input.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.residue.extend_from_slice(bytes);

        let mut start = 0;
        while let Some(offset) = self.residue[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let line = &self.residue[start..end];
            if is_data_line(line) {
                self.data_lines += 1;
            }
            let outcome = parse_line(line);
            start = end + 1;

            match outcome {
                Line::Event(event) => {
                    let terminal = matches!(event, StreamEvent::ErrorSignal(_));
                    events.push(event);
                    if terminal {
                        self.finished = true;
                        self.residue.clear();
                        return events;
                    }
                }
                Line::Malformed => self.malformed += 1,
                Line::Foreign => self.foreign_lines += 1,
                Line::Ignored => {}
            }
        }

        self.residue.drain(..start);
        events
    }

    /// End of input. Discards an unterminated trailing line.
    ///
    /// Returns whether a partial line was discarded.
    pub fn finish(&mut self) -> bool {
        let discarded = !self.residue.is_empty();
        if discarded {
            if is_data_line(&self.residue) {
                self.data_lines += 1;
            } else if !is_field_line(&self.residue) {
                self.foreign_lines += 1;
            }
            debug!(
                bytes = self.residue.len(),
                "Discarding incomplete trailing frame"
            );
            self.residue.clear();
        }
        self.finished = true;
        discarded
    }

    /// Whether an error signal ended the stream or `finish` was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of data lines dropped because they could not be parsed.
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    /// False once the input contained lines that are not event-stream
    /// syntax and no data line at all. An empty body is an event stream.
    pub fn is_event_stream(&self) -> bool {
        self.data_lines > 0 || self.foreign_lines == 0
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn is_data_line(line: &[u8]) -> bool {
    trim_cr(line).starts_with(b"data:")
}

/// Blank lines, comments and known field lines.
fn is_field_line(line: &[u8]) -> bool {
    let line = trim_cr(line);
    line.iter().all(u8::is_ascii_whitespace)
        || line.starts_with(b":")
        || FIELD_PREFIXES.iter().any(|p| line.starts_with(p))
}

fn parse_line(line: &[u8]) -> Line {
    let line = trim_cr(line);
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        if is_field_line(line) {
            return Line::Ignored;
        }
        debug!(bytes = line.len(), "Line is not event-stream syntax");
        return Line::Foreign;
    };

    let payload = match std::str::from_utf8(payload) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Dropping SSE frame with invalid UTF-8");
            return Line::Malformed;
        }
    };

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, payload = %payload, "Dropping unparseable SSE frame");
            return Line::Malformed;
        }
    };

    let chunk = value.get("chunk").and_then(Value::as_str).unwrap_or("");
    if !chunk.is_empty() {
        return Line::Event(StreamEvent::Chunk(chunk.to_string()));
    }

    match value.get("error") {
        Some(Value::Null) | None => {
            debug!(payload = %payload, "SSE frame carries neither chunk nor error");
            Line::Ignored
        }
        Some(Value::String(message)) => Line::Event(StreamEvent::ErrorSignal(message.clone())),
        Some(other) => Line::Event(StreamEvent::ErrorSignal(other.to_string())),
    }
}

/// Decode a response body into protocol events.
///
/// Transport errors are passed through and end the stream. The stream also
/// ends right after an `ErrorSignal`. A non-empty body without a single data
/// line ends with `ClientError::Decode`.
pub fn decode_stream<S>(bytes: S) -> impl Stream<Item = Result<StreamEvent, ClientError>>
where
    S: Stream<Item = Result<Bytes, ClientError>>,
{
    async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        futures::pin_mut!(bytes);

        while let Some(read) = bytes.next().await {
            let read = read?;
            for event in decoder.push(&read) {
                yield event;
            }
            if decoder.is_finished() {
                break;
            }
        }

        decoder.finish();
        if decoder.malformed_count() > 0 {
            debug!(malformed = decoder.malformed_count(), "Stream ended with dropped frames");
        }
        if !decoder.is_event_stream() {
            warn!("Response body is not an event stream");
            Err::<(), _>(ClientError::Decode("response body is not an event stream".to_string()))?;
        }
    }
}
