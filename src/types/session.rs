//! Session and connection status types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag of the connection state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No session has been started yet
    #[default]
    Idle,
    /// Waiting for the transport to open
    Connecting,
    /// Transport open, frames flowing
    Open,
    /// Waiting on the reconnect timer
    Retrying,
    /// Terminal: disconnected or retries exhausted
    Closed,
}

impl SessionState {
    /// Whether the session is live or about to be
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Open | SessionState::Connecting)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Retrying => "retrying",
            SessionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Timers currently scheduled by a feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTimers {
    /// Reconnect timer of a `Retrying` session
    pub reconnect: bool,
    /// Flush interval of the aggregator
    pub flush: bool,
}

impl PendingTimers {
    pub fn none(self) -> bool {
        !self.reconnect && !self.flush
    }
}

/// Snapshot of a feed's connection, as shown by a status indicator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: SessionState,

    /// Monotonic id of the current session (0 before the first connect)
    pub session_id: u64,

    /// Failed connection attempts since the last successful open
    pub attempt: u32,

    /// Human-readable error for the consumer, if any
    pub error: Option<String>,

    pub timers: PendingTimers,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn is_connecting(&self) -> bool {
        self.state == SessionState::Connecting
    }

    /// Short label for status indicators
    pub fn label(&self) -> &'static str {
        match self.state {
            SessionState::Connecting => "Connecting...",
            SessionState::Open => "Live",
            SessionState::Retrying => "Reconnecting",
            SessionState::Idle | SessionState::Closed if self.error.is_some() => "Error",
            SessionState::Idle | SessionState::Closed => "Disconnected",
        }
    }
}

/// Visibility of the hosting environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Foreground
    #[default]
    Visible,
    /// Background
    Hidden,
}
