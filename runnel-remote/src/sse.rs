//! Server-Sent Events decoding for remote streams.
//!
//! The stream endpoint answers with an event stream:
//! ```text
//! event: data
//! data: {"content":"Hel","type":"ai","is_chunk":true}
//!
//! data: {"content":"lo","type":"ai","is_chunk":true}
//!
//! event: end
//! ```
//! Lines are split on `\n` (a trailing `\r` is dropped), consecutive `data`
//! lines are joined with `\n` and a blank line dispatches the event.

use futures::{Stream, StreamExt};
use runnel_core::error::RunnableError;
use runnel_core::Result;

/// One dispatched event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event` field, if the server named the event
    pub event: Option<String>,
    /// Joined `data` lines
    pub data: String,
    /// The `id` field
    pub id: Option<String>,
}

/// Incremental event-stream parser.
///
/// Bytes may be fed in arbitrary pieces; a line split across two pieces (or
/// a multi-byte character split across them) is reassembled before parsing.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = std::str::from_utf8(&raw[..newline])
                .map_err(|e| RunnableError::stream(format!("UTF-8 decode error: {}", e)))?;
            let line = line.trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        Ok(events)
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Result<Option<SseEvent>> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = std::str::from_utf8(&rest)
                .map_err(|e| RunnableError::stream(format!("UTF-8 decode error: {}", e)))?
                .trim_end_matches('\r')
                .to_string();
            if let Some(event) = self.process_line(&line) {
                return Ok(Some(event));
            }
        }
        Ok(self.dispatch())
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
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // retry and unknown fields carry nothing we act on
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data, id })
    }
}

/// Decode a byte stream into events as they arrive
pub fn decode_events<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<SseEvent>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<RunnableError> + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut bytes_stream = std::pin::pin!(byte_stream);

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            match decoder.feed(chunk.as_ref()) {
                Ok(events) => {
                    for event in events {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        match decoder.finish() {
            Ok(Some(event)) => yield Ok(event),
            Ok(None) => {}
            Err(e) => yield Err(e),
        }
    }
}
