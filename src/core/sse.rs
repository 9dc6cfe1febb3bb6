//! Server-sent event framing for streamed chat completions.
//!
//! Bytes arrive in arbitrary slices; an event is only complete once the blank
//! line that terminates it has been seen.

use memchr::memchr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if the server sent one.
    pub event: Option<String>,
    /// `data:` lines of the event joined with `\n`.
    pub data: String,
}

#[derive(Default)]
pub struct SseFramer {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a slice of the body, returning every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(relative) = memchr(b'\n', &self.buffer[start..]) {
            let newline = start + relative;
            let mut end = newline;
            if end > start && self.buffer[end - 1] == b'\r' {
                end -= 1;
            }
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            self.take_line(&line, &mut events);
            start = newline + 1;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        events
    }

    /// The body ended: treat any unterminated line and event as complete.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r').to_string();
            self.take_line(&line, &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn take_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        if self.data.is_empty() {
            self.event = None;
            return;
        }
        events.push(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        });
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}
