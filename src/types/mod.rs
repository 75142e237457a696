//! Core types for the event stream.
//!
//! - [`SseEvent`] is one event as decoded from the SSE wire format
//! - [`Frame`] is the JSON envelope the gateway pushes inside every event
//! - [`EventKind`] names the event types multiplexed over one connection
//! - [`MeasurementEvent`], [`AlertEvent`] and [`EquipmentStatusEvent`] are the
//!   domain payloads; [`StreamEvent`] is their union for the combined feed
//! - [`ConnectionStatus`] is what a connection-status indicator renders
//!
//! ## Usage Example
//!
//! ```rust
//! use facility_stream::types::{EventKind, Frame};
//!
//! let frame: Frame = serde_json::from_str(
//!     r#"{"eventType":"alert","eventId":"1","data":{"id":"a-1","severity":"INFO"}}"#,
//! ).unwrap();
//!
//! assert_eq!(EventKind::from_wire(&frame.event_type), Some(EventKind::Alert));
//! ```

mod events;
mod frame;
mod session;

pub use events::{
    AlertEvent, EquipmentStatusEvent, EventKind, MeasurementEvent, Severity, StreamEvent,
};
pub use frame::{Frame, SseEvent, parse_timestamp};
pub use session::{ConnectionStatus, PendingTimers, SessionState, Visibility};
