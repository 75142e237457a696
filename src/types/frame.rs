//! Raw and decoded frame types

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One event as decoded from the SSE wire format, before JSON parsing.
///
/// This is what a transport handle yields. The demultiplexer turns it into a
/// [`Frame`] (or drops it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if the server sent one
    pub event: Option<String>,

    /// Value of the last `id:` field
    pub id: Option<String>,

    /// All `data:` lines joined with `\n`
    pub data: String,

    /// Reconnection hint from the `retry:` field
    pub retry: Option<Duration>,
}

impl SseEvent {
    /// Create an event with a name and data payload
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self { event: Some(event.into()), data: data.into(), ..Self::default() }
    }

    /// Create an unnamed (`message`) event
    pub fn message(data: impl Into<String>) -> Self {
        Self { data: data.into(), ..Self::default() }
    }

    /// The event name, treating the SSE default `message` as unnamed
    pub fn name(&self) -> Option<&str> {
        self.event.as_deref().filter(|name| !name.is_empty() && *name != "message")
    }
}

/// Envelope pushed by the gateway for every event.
///
/// The payload stays opaque JSON here; the feed's payload type decodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub event_type: String,

    #[serde(default)]
    pub event_id: String,

    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Frame {
    /// Parse the envelope timestamp.
    ///
    /// Accepts RFC 3339 (normalized to UTC) and the zone-less ISO-8601 form the
    /// gateway emits for local date-times.
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }
}

/// Parse an ISO-8601 timestamp with or without offset.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}
