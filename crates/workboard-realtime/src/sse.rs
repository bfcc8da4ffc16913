//! Server-Sent Events (SSE) parsing.
//!
//! [`SseParser`] is fed one line at a time and yields an event at every
//! blank line. [`read_events`] drives it from a reqwest response body.

use std::ops::ControlFlow;

use futures_util::StreamExt;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use workboard_common::ApiError;

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if the server sent one.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// Last `id:` seen on the stream.
    pub id: Option<String>,
}

impl SseEvent {
    /// Event type; unnamed events are `message`.
    pub fn kind(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

#[derive(Debug, Default)]
pub struct SseParser {
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line without its terminator.
    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);
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
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            // retry: and unknown fields
            _ => {}
        }
        None
    }

    /// Flush a trailing event the stream ended without terminating.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}

/// Read SSE events from `response` until the body ends or `on_event` breaks.
pub async fn read_events(
    response: reqwest::Response,
    mut on_event: impl FnMut(SseEvent) -> ControlFlow<()>,
) -> Result<(), ApiError> {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));
    let reader = tokio::io::BufReader::new(StreamReader::new(byte_stream));
    let mut lines = reader.lines();
    let mut parser = SseParser::new();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?
    {
        if let Some(event) = parser.push_line(&line) {
            if on_event(event).is_break() {
                return Ok(());
            }
        }
    }

    if let Some(event) = parser.finish() {
        let _ = on_event(event);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(input: &str) -> Vec<SseEvent> {
        let mut parser = SseParser::new();
        let mut events: Vec<SseEvent> = input.lines().filter_map(|l| parser.push_line(l)).collect();
        events.extend(parser.finish());
        events
    }

    #[test]
    fn named_event_with_multiline_data() {
        let events = feed("event: alarm\ndata: {\"a\":\ndata: 1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "alarm");
        assert_eq!(events[0].data, "{\"a\":\n1}");
    }

    #[test]
    fn comments_and_retry_are_ignored() {
        let events = feed(": keep-alive\nretry: 3000\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "message");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn blank_line_without_data_yields_nothing() {
        assert!(feed("event: ping\n\n\n").is_empty());
    }

    #[test]
    fn event_name_does_not_leak_into_next_event() {
        let events = feed("event: connect\ndata: ok\n\ndata: plain\n\n");
        assert_eq!(events[0].kind(), "connect");
        assert_eq!(events[1].kind(), "message");
    }

    #[test]
    fn id_persists_and_crlf_is_stripped() {
        let events = feed("id: 7\r\ndata: a\r\n\r\ndata: b\r\n\r\n");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert_eq!(events[1].data, "b");
    }

    #[test]
    fn field_without_space_after_colon() {
        let events = feed("data:tight\n\n");
        assert_eq!(events[0].data, "tight");
    }

    #[test]
    fn trailing_event_is_flushed() {
        let events = feed("event: alarm\ndata: late");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "late");
    }
}
