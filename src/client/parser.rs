//! Incremental parser for `text/event-stream` bodies.
//!
//! Chunks from the network may split a frame, a line, or even a CRLF pair at
//! any byte. The parser buffers the unfinished tail and only emits events for
//! frames terminated by a blank line.
//!
//! # Frame format
//!
//! ```text
//! : keep-alive comment
//! event: progress
//! id: 7
//! data: {"percent": 40}
//! data: {"percent": 41}
//!
//! ```
//!
//! Multiple `data:` lines are joined with `\n`. A single space after the colon
//! is stripped. Frames with no `data` field are dropped.
//!
//! # Examples
//!
//! ```ignore
//! use studio_http::SseParser;
//!
//! let mut parser = SseParser::new();
//! assert!(parser.feed(b"data: {\"a\"").is_empty());
//! let events = parser.feed(b":1}\n\n");
//! assert_eq!(events[0].data, "{\"a\":1}");
//! ```

use bytes::BytesMut;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Event type; `None` means the default `message` type.
    pub event: Option<String>,
    /// Payload, `data` lines joined with `\n`.
    pub data: String,
    /// Last event id seen on the stream.
    pub id: Option<String>,
    /// Reconnection hint in milliseconds.
    pub retry: Option<u64>,
}

/// Parser state for one stream.
#[derive(Debug, Default)]
pub struct SseParser {
    /// Bytes not yet terminated by a line break
    buffer: BytesMut,
    /// Fields of the frame being assembled
    event: Option<String>,
    data: Vec<String>,
    retry: Option<u64>,
    /// Persists across frames, as the last-event-id does
    last_id: Option<String>,
    /// A CR ended the previous chunk; a leading LF belongs to it
    pending_cr: bool,
}

impl SseParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns the events completed by them.
    pub fn feed(&mut self, data: &[u8]) -> Vec<SseEvent> {
        let mut data = data;
        if self.pending_cr {
            self.pending_cr = false;
            if let Some(rest) = data.strip_prefix(b"\n") {
                data = rest;
            }
        }
        self.buffer.extend_from_slice(data);

        let mut events = Vec::new();
        while let Some((line_end, terminator)) = self.find_line_end() {
            let line = self.buffer.split_to(line_end);
            let _ = self.buffer.split_to(terminator);
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Position and length of the first line terminator (`\n`, `\r\n` or `\r`).
    fn find_line_end(&mut self) -> Option<(usize, usize)> {
        let pos = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r')?;
        if self.buffer[pos] == b'\n' {
            return Some((pos, 1));
        }
        match self.buffer.get(pos + 1) {
            Some(b'\n') => Some((pos, 2)),
            Some(_) => Some((pos, 1)),
            None => {
                self.pending_cr = true;
                Some((pos, 1))
            }
        }
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(retry) = value.parse() {
                    self.retry = Some(retry);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let retry = self.retry.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event: event.filter(|e| !e.is_empty()),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.last_id.clone(),
            retry,
        })
    }

    /// Whether a partial frame is buffered.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.data.is_empty() || self.event.is_some()
    }

    /// Last event id seen.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }
}
