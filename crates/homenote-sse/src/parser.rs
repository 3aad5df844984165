//! Incremental event-stream parser
//!
//! Bytes arrive in arbitrary chunks. The parser keeps undecoded bytes (a
//! UTF-8 sequence may straddle two chunks), normalises CR and CRLF line
//! endings to LF, and cuts frames at each blank line.
//!
//! Within a frame:
//! - `id:`, `event:` and `data:` lines are recognised; one leading space
//!   after the colon is dropped
//! - several `data:` lines are joined with `\n`
//! - lines starting with `:` are comments (keep-alives)
//! - a frame without `event:` is named `message`
//! - a frame with neither `data:` nor `event:` produces nothing
//!
//! [`SseFrameParser`] also tracks the last event id across frames. An
//! `id:` line updates it even when its frame produces no event, and an
//! empty `id:` clears it.

use serde::{Deserialize, Serialize};

/// Event name used when a frame has no `event:` line
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One dispatched server event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Create event
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            id: None,
        }
    }

    /// With event id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Fields of one frame
#[derive(Debug, Default)]
struct Frame<'a> {
    name: Option<&'a str>,
    data: Vec<&'a str>,
    id: Option<&'a str>,
}

impl<'a> Frame<'a> {
    fn scan(frame: &'a str) -> Self {
        let mut fields = Self::default();

        for line in frame.split('\n') {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => fields.name = Some(value),
                "data" => fields.data.push(value),
                // NUL in an id is ignored per the event-stream format
                "id" if !value.contains('\0') => fields.id = Some(value),
                _ => {}
            }
        }
        fields
    }

    fn into_event(self) -> Option<SseEvent> {
        if self.name.is_none() && self.data.is_empty() {
            return None;
        }

        Some(SseEvent {
            name: self
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_EVENT_NAME)
                .to_string(),
            data: self.data.join("\n"),
            id: self.id.filter(|id| !id.is_empty()).map(str::to_string),
        })
    }
}

/// Parse one frame (text between blank lines)
#[must_use]
pub fn parse_frame(frame: &str) -> Option<SseEvent> {
    Frame::scan(frame).into_event()
}

/// Stateful chunk-to-event parser
#[derive(Debug, Default)]
pub struct SseFrameParser {
    undecoded: Vec<u8>,
    text: String,
    pending_cr: bool,
    last_event_id: Option<String>,
}

impl SseFrameParser {
    /// Create empty parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser that continues from a previously seen event id
    #[inline]
    #[must_use]
    pub fn resuming(last_event_id: Option<String>) -> Self {
        Self {
            last_event_id,
            ..Self::default()
        }
    }

    /// Event id to replay from, as of the last complete frame
    #[inline]
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Feed a chunk, returning every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.undecoded.extend_from_slice(chunk);
        self.decode();

        let mut events = Vec::new();
        while let Some(end) = self.text.find("\n\n") {
            let frame: String = self.text.drain(..end + 2).collect();
            let fields = Frame::scan(&frame[..end]);
            if let Some(id) = fields.id {
                self.last_event_id = (!id.is_empty()).then(|| id.to_string());
            }
            if let Some(event) = fields.into_event() {
                events.push(event);
            }
        }
        events
    }

    /// Drop any partial frame; the last event id is kept
    pub fn reset(&mut self) {
        self.undecoded.clear();
        self.text.clear();
        self.pending_cr = false;
    }

    /// Whether a partial frame is buffered
    #[inline]
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.undecoded.is_empty() || !self.text.is_empty() || self.pending_cr
    }

    fn decode(&mut self) {
        loop {
            match std::str::from_utf8(&self.undecoded) {
                Ok(valid) => {
                    let valid = valid.to_string();
                    self.append_normalized(&valid);
                    self.undecoded.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            let head: Vec<u8> = self.undecoded.drain(..valid_up_to).collect();
                            let head = String::from_utf8_lossy(&head).into_owned();
                            self.append_normalized(&head);
                            return;
                        }
                        Some(bad) => {
                            let head: Vec<u8> = self.undecoded.drain(..valid_up_to + bad).collect();
                            let head = String::from_utf8_lossy(&head).into_owned();
                            self.append_normalized(&head);
                        }
                    }
                }
            }
        }
    }

    fn append_normalized(&mut self, s: &str) {
        for c in s.chars() {
            if self.pending_cr {
                self.pending_cr = false;
                self.text.push('\n');
                if c == '\n' {
                    continue;
                }
            }
            if c == '\r' {
                self.pending_cr = true;
                continue;
            }
            self.text.push(c);
        }
    }
}
