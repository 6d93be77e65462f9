use crate::error::CommonRequestError;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;

type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

/// A single server-sent event.
///
/// `data` holds the joined `data:` lines exactly as sent, so sentinels such as
/// `[DONE]` reach the caller untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// Server-Sent Events parser for streaming responses
pub struct SseParser {
    byte_stream: ByteStream,
    buffer: Vec<u8>,
    pending: PendingEvent,
}

impl SseParser {
    pub fn new(response: reqwest::Response) -> Self {
        Self::from_stream(response.bytes_stream())
    }

    /// Build a parser over any byte stream (used by tests and custom transports)
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    {
        Self {
            byte_stream: Box::pin(stream),
            buffer: Vec::new(),
            pending: PendingEvent::default(),
        }
    }

    /// Get the next event from the stream, `None` once the body is exhausted
    ///
    /// # Errors
    ///
    /// Fails if reading the body fails or a line is not valid UTF-8.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, CommonRequestError> {
        loop {
            if let Some(event) = self.try_parse_event_from_buffer()? {
                return Ok(Some(event));
            }

            if let Some(chunk_result) = self.byte_stream.next().await {
                let chunk = chunk_result?;
                self.buffer.extend_from_slice(&chunk);
            } else {
                // Body closed without a trailing blank line
                if !self.buffer.is_empty() {
                    let line = String::from_utf8(std::mem::take(&mut self.buffer))?;
                    if let Some(event) = self.pending.feed(&line) {
                        return Ok(Some(event));
                    }
                }
                return Ok(self.pending.dispatch());
            }
        }
    }

    fn try_parse_event_from_buffer(&mut self) -> Result<Option<SseEvent>, CommonRequestError> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes = self.buffer.drain(..=pos).collect::<Vec<u8>>();
            let line = String::from_utf8(line_bytes)?;

            if let Some(event) = self.pending.feed(&line) {
                return Ok(Some(event));
            }
        }

        Ok(None)
    }
}

/// Field accumulator for the event currently being read
#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    id: Option<String>,
    data_lines: Vec<String>,
}

impl PendingEvent {
    /// Feed one line; returns an event when the line terminates one
    fn feed(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.trim_end_matches(['\n', '\r']);

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
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // retry and unknown fields are ignored
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            self.event = None;
            return None;
        }

        let event = SseEvent {
            event: self.event.take(),
            id: self.id.take(),
            data: self.data_lines.join("\n"),
        };
        self.data_lines.clear();
        Some(event)
    }
}
