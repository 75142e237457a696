//! In-memory transport for exercising feeds without a server.
//!
//! [`MockTransport::pair`] returns the transport together with a [`MockServer`]
//! handle the test uses to refuse connections, push events, and drop the
//! current connection.

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use super::{Transport, TransportHandle};
use crate::types::SseEvent;
use crate::{Result, StreamError};

type Inbound = std::result::Result<SseEvent, String>;

#[derive(Debug, Default)]
struct MockState {
    refuse_remaining: u32,
    refuse_all: bool,
    open_delay: Option<Duration>,
    opens: u32,
    urls: Vec<Url>,
    current: Option<mpsc::UnboundedSender<Inbound>>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    live_handles: AtomicUsize,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Transport backed by in-memory channels
#[derive(Debug, Clone)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Build a transport + server control pair
    pub fn pair() -> (Self, MockServer) {
        let shared = Arc::new(Shared::default());
        (Self { shared: Arc::clone(&shared) }, MockServer { shared })
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    type Handle = MockHandle;

    async fn open(&self, url: &Url) -> Result<MockHandle> {
        let delay = {
            let mut state = self.shared.state();
            state.opens += 1;
            state.urls.push(url.clone());
            state.open_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.shared.state();
        if state.refuse_all {
            return Err(StreamError::transport("connection refused"));
        }
        if state.refuse_remaining > 0 {
            state.refuse_remaining -= 1;
            return Err(StreamError::transport("connection refused"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        // Replacing the sender ends any previous handle's stream
        state.current = Some(tx);
        self.shared.live_handles.fetch_add(1, Ordering::SeqCst);
        Ok(MockHandle { rx, shared: Arc::clone(&self.shared) })
    }
}

/// Client side of one mock connection
#[derive(Debug)]
pub struct MockHandle {
    rx: mpsc::UnboundedReceiver<Inbound>,
    shared: Arc<Shared>,
}

#[async_trait::async_trait]
impl TransportHandle for MockHandle {
    async fn next_event(&mut self) -> Result<Option<SseEvent>> {
        match self.rx.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(reason)) => Err(StreamError::transport(reason)),
            None => Ok(None),
        }
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.shared.live_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Error surface for operations on [`MockServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MockServerError {
    /// No connection is currently open
    #[error("no mock connection is open")]
    NotConnected,
}

/// Server-side test handle paired with [`MockTransport`]
#[derive(Debug)]
pub struct MockServer {
    shared: Arc<Shared>,
}

impl MockServer {
    /// Refuse the next `count` connection attempts
    pub fn refuse_next(&self, count: u32) {
        self.shared.state().refuse_remaining = count;
    }

    /// Refuse every connection attempt until reset
    pub fn refuse_all(&self, refuse: bool) {
        self.shared.state().refuse_all = refuse;
    }

    /// Delay every open by `delay` (uses tokio time)
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        self.shared.state().open_delay = delay;
    }

    /// Push a raw event to the open connection
    pub fn send(&self, event: SseEvent) -> std::result::Result<(), MockServerError> {
        let state = self.shared.state();
        let tx = state.current.as_ref().ok_or(MockServerError::NotConnected)?;
        tx.send(Ok(event)).map_err(|_| MockServerError::NotConnected)
    }

    /// Push a gateway envelope `{eventType, eventId, data, timestamp}`
    pub fn send_frame(
        &self,
        event_type: &str,
        event_id: &str,
        data: serde_json::Value,
    ) -> std::result::Result<(), MockServerError> {
        let envelope = json!({
            "eventType": event_type,
            "eventId": event_id,
            "data": data,
            "timestamp": "2024-05-01T10:00:00",
        });
        self.send(SseEvent::new(event_type, envelope.to_string()))
    }

    /// Push a keep-alive frame
    pub fn send_keep_alive(&self) -> std::result::Result<(), MockServerError> {
        self.send_frame("keep-alive", "ka", json!("ping"))
    }

    /// Push a gateway error frame
    pub fn send_error(&self, message: &str) -> std::result::Result<(), MockServerError> {
        self.send(SseEvent::new("error", json!({ "error": message }).to_string()))
    }

    /// Close the open connection cleanly (stream ends)
    pub fn close_connection(&self) -> bool {
        self.shared.state().current.take().is_some()
    }

    /// Break the open connection with a transport error
    pub fn drop_connection(&self, reason: &str) -> bool {
        match self.shared.state().current.take() {
            Some(tx) => tx.send(Err(reason.to_string())).is_ok(),
            None => false,
        }
    }

    /// Number of `open` calls so far, refused ones included
    pub fn open_count(&self) -> u32 {
        self.shared.state().opens
    }

    /// URLs requested so far
    pub fn urls(&self) -> Vec<Url> {
        self.shared.state().urls.clone()
    }

    /// Handles currently held by a client
    pub fn live_handles(&self) -> usize {
        self.shared.live_handles.load(Ordering::SeqCst)
    }
}
