//! Driver task that owns a feed's connection and aggregator

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::StreamError;
use crate::aggregator::{Aggregator, FeedSnapshot};
use crate::connection::{ConnectionEvent, StreamConnection};
use crate::demux::{Demultiplexer, Dispatch};
use crate::feed::FeedPayload;
use crate::supervisor::StreamObserver;
use crate::transport::Transport;
use crate::types::{ConnectionStatus, PendingTimers, SseEvent, Visibility};

/// Message shown once the reconnect budget is spent
pub const EXHAUSTED_MESSAGE: &str = "Max reconnection attempts reached. Call connect() to retry.";

/// Message shown when a connection drops with auto-reconnect disabled
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost.";

/// Request sent from a supervisor handle to its driver
#[derive(Debug)]
pub enum Command {
    Connect(oneshot::Sender<()>),
    Disconnect(oneshot::Sender<()>),
    ClearData(oneshot::Sender<()>),
    SetVisibility(Visibility, oneshot::Sender<()>),
}

/// Result of spawning a driver
pub struct DriverChannels<T> {
    /// Sender for supervisor commands
    pub commands: mpsc::Sender<Command>,
    /// Receiver for connection status
    pub status: watch::Receiver<ConnectionStatus>,
    /// Receiver for feed snapshots, updated once per flush or clear
    pub feed: watch::Receiver<Arc<FeedSnapshot<T>>>,
    /// Cancellation token for shutdown
    pub cancel: CancellationToken,
}

/// Spawns the task that serializes commands, transport events and flush ticks
pub struct Driver;

impl Driver {
    /// Spawn a driver for one feed.
    ///
    /// The task runs until the token is cancelled or every command sender is
    /// dropped. Nothing happens on the wire until a `Connect` command arrives.
    pub fn spawn<C, T>(
        connection: StreamConnection<C>,
        aggregator: Aggregator<T>,
        observer: Arc<dyn StreamObserver<T>>,
    ) -> DriverChannels<T>
    where
        C: Transport,
        T: FeedPayload,
    {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let (feed_tx, feed_rx) = watch::channel(Arc::new(aggregator.snapshot()));
        let cancel = CancellationToken::new();

        let state = DriverState {
            connection,
            aggregator,
            demux: Demultiplexer::new(),
            observer,
            visibility: Visibility::Visible,
            error: None,
            status_tx,
            feed_tx,
        };

        let cancel_driver = cancel.clone();
        tokio::spawn(async move {
            state.run(command_rx, cancel_driver).await;
        });

        DriverChannels { commands: command_tx, status: status_rx, feed: feed_rx, cancel }
    }
}

struct DriverState<C: Transport, T> {
    connection: StreamConnection<C>,
    aggregator: Aggregator<T>,
    demux: Demultiplexer<T>,
    observer: Arc<dyn StreamObserver<T>>,
    visibility: Visibility,
    error: Option<String>,
    status_tx: watch::Sender<ConnectionStatus>,
    feed_tx: watch::Sender<Arc<FeedSnapshot<T>>>,
}

impl<C, T> DriverState<C, T>
where
    C: Transport,
    T: FeedPayload,
{
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, cancel: CancellationToken) {
        info!(url = %self.connection.url(), "Stream driver started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Stream driver cancelled");
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All supervisor handles dropped, shutting down");
                        break;
                    }
                },
                event = self.connection.next_event() => self.handle_connection_event(event),
                _ = self.aggregator.tick() => self.flush(),
            }
        }

        self.connection.close();
        self.aggregator.disarm();
        self.publish_status();
        info!(flushes = self.aggregator.flush_count(), "Stream driver ended");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(ack) => {
                self.connect();
                let _ = ack.send(());
            }
            Command::Disconnect(ack) => {
                self.disconnect();
                let _ = ack.send(());
            }
            Command::ClearData(ack) => {
                self.aggregator.clear();
                self.publish_feed();
                let _ = ack.send(());
            }
            Command::SetVisibility(visibility, ack) => {
                self.set_visibility(visibility);
                let _ = ack.send(());
            }
        }
    }

    fn connect(&mut self) {
        self.error = None;
        self.connection.open();
        self.aggregator.arm();
        self.publish_status();
    }

    fn disconnect(&mut self) {
        info!(session = self.connection.session_id(), "Disconnecting stream");
        self.connection.close();
        let dropped = self.aggregator.discard_pending();
        if dropped > 0 {
            debug!(dropped, "Discarded pending batch on disconnect");
        }
        self.aggregator.disarm();
        self.publish_status();
        self.observer.on_close();
    }

    fn set_visibility(&mut self, visibility: Visibility) {
        let previous = std::mem::replace(&mut self.visibility, visibility);
        if previous == Visibility::Hidden
            && visibility == Visibility::Visible
            && !self.connection.state().is_active()
        {
            info!(state = %self.connection.state(), "Foregrounded while inactive, reconnecting");
            self.connect();
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                self.error = None;
                self.observer.on_open();
            }
            ConnectionEvent::Frame(raw) => {
                self.dispatch(&raw);
                // Only server error frames touch the status
                return;
            }
            ConnectionEvent::Retrying { delay, error, .. } => {
                let seconds = delay.as_secs_f64().round() as u64;
                self.error = Some(format!("Connection lost. Reconnecting in {seconds}s..."));
                self.observer.on_error(&error);
            }
            ConnectionEvent::Reconnecting { attempt } => {
                trace!(attempt, "Reconnect handshake started");
                self.error = None;
            }
            ConnectionEvent::Failed { error } => {
                self.error = Some(match error {
                    StreamError::RetriesExhausted { .. } => EXHAUSTED_MESSAGE.to_string(),
                    _ => CONNECTION_LOST_MESSAGE.to_string(),
                });
                self.observer.on_error(&error);
                // Deliver what already arrived, then stop ticking
                self.flush();
                self.aggregator.disarm();
            }
        }
        self.publish_status();
    }

    fn dispatch(&mut self, raw: &SseEvent) {
        match self.demux.classify(raw) {
            Dispatch::KeepAlive => trace!("Keep-alive"),
            Dispatch::ServerError(message) => {
                warn!("Server reported stream error: {}", message);
                let error = StreamError::server(message.clone());
                self.error = Some(message);
                self.observer.on_error(&error);
                self.publish_status();
            }
            Dispatch::Deliver { frame, kind, payload } => {
                trace!(%kind, event_id = %frame.event_id, "Accepted frame");
                self.observer.on_message(&frame);
                self.aggregator.push(payload);
            }
            Dispatch::Ignored { event_type } => {
                debug!(event_type, "Ignoring frame not carried by this feed");
            }
            Dispatch::Malformed(error) => {
                debug!("Dropping malformed frame: {}", error);
            }
        }
    }

    fn flush(&mut self) {
        if self.aggregator.flush().is_none() {
            return;
        }
        let snapshot = Arc::new(self.aggregator.snapshot());
        self.observer.on_batch(&snapshot);
        self.feed_tx.send_replace(snapshot);
    }

    fn publish_feed(&self) {
        self.feed_tx.send_replace(Arc::new(self.aggregator.snapshot()));
    }

    fn publish_status(&self) {
        let status = ConnectionStatus {
            state: self.connection.state(),
            session_id: self.connection.session_id(),
            attempt: self.connection.attempt(),
            error: self.error.clone(),
            timers: PendingTimers {
                reconnect: self.connection.reconnect_pending(),
                flush: self.aggregator.is_armed(),
            },
        };
        self.status_tx.send_replace(status);
    }
}
