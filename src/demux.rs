//! Frame classification.
//!
//! Every raw event read from the connection goes through [`Demultiplexer::classify`]
//! exactly once. Liveness frames stop here, error frames are split off for the
//! status channel, and domain frames are decoded into the feed's payload type.
//! Nothing in here can fail the connection: a frame that cannot be understood
//! becomes [`Dispatch::Malformed`] and is dropped by the caller.

use serde::Deserialize;
use std::marker::PhantomData;

use crate::feed::FeedPayload;
use crate::types::{EventKind, Frame, SseEvent};
use crate::{Result, StreamError};

/// Fallback message for error frames without a readable payload
pub const UNREADABLE_ERROR_FRAME: &str = "Stream error";

/// Outcome of classifying one raw event
#[derive(Debug)]
pub enum Dispatch<T> {
    /// Liveness signal; never reaches the aggregator
    KeepAlive,
    /// Server-reported error on an otherwise healthy connection
    ServerError(String),
    /// Domain payload for the aggregator
    Deliver { frame: Frame, kind: EventKind, payload: T },
    /// Valid frame this feed does not carry
    Ignored { event_type: String },
    /// Frame that could not be decoded
    Malformed(StreamError),
}

/// Classifier from raw events to typed payloads of one feed
#[derive(Debug, Clone, Copy, Default)]
pub struct Demultiplexer<T> {
    _payload: PhantomData<fn() -> T>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl<T: FeedPayload> Demultiplexer<T> {
    pub fn new() -> Self {
        Self { _payload: PhantomData }
    }

    pub fn classify(&self, raw: &SseEvent) -> Dispatch<T> {
        // The SSE event name wins for liveness and errors: gateway error frames
        // carry a bare `{"error": ...}` body without an envelope.
        match raw.name().and_then(EventKind::from_wire) {
            Some(EventKind::KeepAlive) => return Dispatch::KeepAlive,
            Some(EventKind::Error) => return Dispatch::ServerError(error_message(&raw.data)),
            _ => {}
        }

        let frame = match parse_frame(&raw.data) {
            Ok(frame) => frame,
            Err(error) => return Dispatch::Malformed(error),
        };

        let kind = match EventKind::from_wire(&frame.event_type) {
            Some(EventKind::KeepAlive) => return Dispatch::KeepAlive,
            Some(EventKind::Error) => return Dispatch::ServerError(payload_message(&frame.data)),
            Some(kind) if T::accepts(kind) => kind,
            _ => return Dispatch::Ignored { event_type: frame.event_type },
        };

        match T::decode(kind, &frame.data) {
            Ok(payload) => Dispatch::Deliver { frame, kind, payload },
            Err(error) => Dispatch::Malformed(error),
        }
    }
}

fn parse_frame(data: &str) -> Result<Frame> {
    if data.trim().is_empty() {
        return Err(StreamError::protocol("empty frame"));
    }
    Ok(serde_json::from_str(data)?)
}

/// Message of a bare error frame body
fn error_message(data: &str) -> String {
    match serde_json::from_str::<ErrorBody>(data) {
        Ok(ErrorBody { error: Some(message) }) => message,
        Ok(ErrorBody { error: None }) => "Unknown error".to_string(),
        Err(_) => UNREADABLE_ERROR_FRAME.to_string(),
    }
}

/// Message of an enveloped error frame payload
fn payload_message(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(message) => message.clone(),
        serde_json::Value::Object(map) => match map.get("error") {
            Some(serde_json::Value::String(message)) => message.clone(),
            _ => data.to_string(),
        },
        serde_json::Value::Null => UNREADABLE_ERROR_FRAME.to_string(),
        other => other.to_string(),
    }
}
