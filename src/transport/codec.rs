//! Incremental Server-Sent Events decoder

use std::time::Duration;
use tracing::{debug, trace};

use crate::types::SseEvent;
use crate::{Result, StreamError};

/// Longest line accepted before the stream is treated as broken
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Push-based SSE decoder.
///
/// Feed it body chunks as they arrive; it returns every event completed by the
/// chunk. Partial lines and partial events are carried over to the next call,
/// so chunk boundaries may fall anywhere, including inside a UTF-8 sequence or
/// between the `\r` and `\n` of a line ending.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    /// Last byte seen was a `\r`; a following `\n` belongs to the same line ending
    after_cr: bool,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    retry: Option<Duration>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, returning the events it completes.
    ///
    /// Fails once a single line exceeds [`MAX_LINE_LENGTH`] bytes.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>> {
        let mut events = Vec::new();

        for &byte in chunk {
            match byte {
                b'\n' if self.after_cr => {
                    self.after_cr = false;
                }
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                        events.push(event);
                    }
                }
                _ => {
                    self.after_cr = false;
                    if self.line.len() >= MAX_LINE_LENGTH {
                        self.line.clear();
                        return Err(StreamError::protocol(format!(
                            "SSE line exceeds {MAX_LINE_LENGTH} bytes"
                        )));
                    }
                    self.line.push(byte);
                }
            }
        }

        Ok(events)
    }

    /// Drop whatever the stream left unterminated.
    ///
    /// An event is only dispatched by its closing blank line, so a partial
    /// line or pending fields at end of stream are discarded.
    pub fn finish(&mut self) {
        let partial = !self.line.is_empty() || !self.data.is_empty() || self.event.is_some();
        if partial {
            debug!("Discarding unterminated SSE event at end of stream");
        }
        self.line.clear();
        self.after_cr = false;
        self.event = None;
        self.data.clear();
        self.retry = None;
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment lines carry server keep-alive padding
        if line.starts_with(':') {
            trace!("SSE comment: {}", line);
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => trace!("Ignoring SSE field '{}'", field),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let retry = self.retry.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        // `id` persists across events per the SSE model
        Some(SseEvent { event, id: self.id.clone(), data, retry })
    }
}
