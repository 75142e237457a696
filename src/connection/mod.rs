//! Stream connection state machine.
//!
//! [`StreamConnection`] owns the one transport handle of a feed and the
//! [`Session`] bookkeeping around it. It is driven by awaiting
//! [`StreamConnection::next_event`], which advances whatever the current phase
//! is waiting on (handshake, next frame, or reconnect timer) and reports the
//! resulting transition.
//!
//! ```text
//!  Idle ──open()──▶ Connecting ──opened──▶ Open
//!                      ▲   │                 │
//!               timer  │   └──failure──┐     │ failure
//!                      │               ▼     ▼
//!                      └────────── Retrying ─┘
//!                                      │ attempt ≥ max_retries
//!   any ──close()──▶ Closed ◀──────────┘
//! ```

use futures::future::BoxFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::retry::RetryPolicy;
use crate::transport::{Transport, TransportHandle};
use crate::types::{SessionState, SseEvent};
use crate::{Result, StreamError};


/// Transition reported by [`StreamConnection::next_event`]
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Transport accepted the stream; `attempt` was reset
    Opened,
    /// Raw event received on an open connection
    Frame(SseEvent),
    /// Connection failed; a reconnect is scheduled
    Retrying { attempt: u32, delay: Duration, error: StreamError },
    /// Reconnect timer fired; a new handshake has started
    Reconnecting { attempt: u32 },
    /// Connection failed and no reconnect will follow; session is closed
    Failed { error: StreamError },
}

enum Phase<H> {
    Idle,
    Connecting(BoxFuture<'static, Result<H>>),
    Open(H),
    Retrying { timer: Pin<Box<Sleep>>, deadline: Instant },
    Closed,
}

impl<H> Phase<H> {
    fn state(&self) -> SessionState {
        match self {
            Phase::Idle => SessionState::Idle,
            Phase::Connecting(_) => SessionState::Connecting,
            Phase::Open(_) => SessionState::Open,
            Phase::Retrying { .. } => SessionState::Retrying,
            Phase::Closed => SessionState::Closed,
        }
    }
}

/// One connect-and-maintain lifecycle, from `open()` to `Closed`
struct Session<H> {
    id: u64,
    phase: Phase<H>,
    attempt: u32,
    last_error: Option<StreamError>,
}

impl<H> Session<H> {
    fn idle() -> Self {
        Self { id: 0, phase: Phase::Idle, attempt: 0, last_error: None }
    }
}

enum Step<H> {
    Handshake(Result<H>),
    Received(Result<Option<SseEvent>>),
    TimerFired,
}

/// Owner of the transport handle and the session state machine
pub struct StreamConnection<C: Transport> {
    transport: Arc<C>,
    url: Url,
    policy: RetryPolicy,
    auto_reconnect: bool,
    session: Session<C::Handle>,
}

impl<C: Transport> StreamConnection<C> {
    pub fn new(transport: Arc<C>, url: Url, policy: RetryPolicy) -> Self {
        Self { transport, url, policy, auto_reconnect: true, session: Session::idle() }
    }

    /// Close on the first failure instead of scheduling reconnects
    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub fn state(&self) -> SessionState {
        self.session.phase.state()
    }

    pub fn session_id(&self) -> u64 {
        self.session.id
    }

    pub fn attempt(&self) -> u32 {
        self.session.attempt
    }

    pub fn last_error(&self) -> Option<&StreamError> {
        self.session.last_error.as_ref()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether a reconnect timer is scheduled
    pub fn reconnect_pending(&self) -> bool {
        matches!(self.session.phase, Phase::Retrying { .. })
    }

    /// When the scheduled reconnect fires, if any
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        match &self.session.phase {
            Phase::Retrying { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    /// Start a new session, tearing down the current one first.
    ///
    /// The previous handle and any reconnect timer are dropped before the new
    /// handshake starts, so two sessions never run side by side.
    pub fn open(&mut self) {
        let previous = self.state();
        self.close();

        let id = self.session.id + 1;
        info!(session = id, url = %self.url, "Opening stream session");
        if previous != SessionState::Idle && previous != SessionState::Closed {
            debug!(session = id, "Superseding session in state {}", previous);
        }

        self.session = Session { id, phase: self.handshake(), attempt: 0, last_error: None };
    }

    /// Tear the session down. Idempotent.
    pub fn close(&mut self) {
        if matches!(self.session.phase, Phase::Idle | Phase::Closed) {
            return;
        }
        debug!(session = self.session.id, "Closing stream session ({})", self.state());
        // Dropping the phase releases the handle, cancels the handshake and the timer
        self.session.phase = Phase::Closed;
    }

    /// Advance the session and report the next transition.
    ///
    /// Pends forever while the session is `Idle` or `Closed`. Cancel-safe: the
    /// in-flight handshake and reconnect timer live in the session, so dropping
    /// this future loses nothing.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        let step = match &mut self.session.phase {
            Phase::Connecting(handshake) => Step::Handshake(handshake.await),
            Phase::Open(handle) => Step::Received(handle.next_event().await),
            Phase::Retrying { timer, .. } => {
                timer.as_mut().await;
                Step::TimerFired
            }
            Phase::Idle | Phase::Closed => return std::future::pending().await,
        };

        match step {
            Step::Handshake(Ok(handle)) => {
                info!(session = self.session.id, "Stream connected");
                self.session.phase = Phase::Open(handle);
                self.session.attempt = 0;
                self.session.last_error = None;
                ConnectionEvent::Opened
            }
            Step::Handshake(Err(error)) => self.fail(error),
            Step::Received(Ok(Some(event))) => {
                trace!(session = self.session.id, event = ?event.event, "Raw event");
                ConnectionEvent::Frame(event)
            }
            Step::Received(Ok(None)) => self.fail(StreamError::transport("stream closed by server")),
            Step::Received(Err(error)) => self.fail(error),
            Step::TimerFired => {
                debug!(
                    session = self.session.id,
                    attempt = self.session.attempt,
                    "Reconnect timer fired"
                );
                self.session.phase = self.handshake();
                ConnectionEvent::Reconnecting { attempt: self.session.attempt }
            }
        }
    }

    fn handshake(&self) -> Phase<C::Handle> {
        let transport = Arc::clone(&self.transport);
        let url = self.url.clone();
        Phase::Connecting(Box::pin(async move { transport.open(&url).await }))
    }

    /// Record a failed attempt and pick the next phase
    fn fail(&mut self, error: StreamError) -> ConnectionEvent {
        let session = self.session.id;
        let attempt = self.session.attempt;

        if !self.auto_reconnect {
            warn!(session, "Connection lost, auto-reconnect disabled: {}", error);
            self.session.phase = Phase::Closed;
            self.session.last_error = Some(StreamError::transport(error.to_string()));
            return ConnectionEvent::Failed { error };
        }

        if self.policy.is_exhausted(attempt) {
            error!(session, attempt, "Reconnection attempts exhausted: {}", error);
            self.session.phase = Phase::Closed;
            self.session.last_error = Some(StreamError::RetriesExhausted { attempts: attempt });
            return ConnectionEvent::Failed {
                error: StreamError::RetriesExhausted { attempts: attempt },
            };
        }

        let delay = self.policy.delay(attempt);
        let deadline = Instant::now() + delay;
        self.session.attempt = attempt + 1;
        warn!(
            session,
            attempt = self.session.attempt,
            max_retries = self.policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Connection lost, reconnecting: {}",
            error
        );
        self.session.phase =
            Phase::Retrying { timer: Box::pin(tokio::time::sleep_until(deadline)), deadline };
        self.session.last_error = Some(StreamError::transport(error.to_string()));

        ConnectionEvent::Retrying { attempt: self.session.attempt, delay, error }
    }
}
