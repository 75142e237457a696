//! Consumer-facing handle for one feed.
//!
//! A [`Supervisor`] owns a spawned driver task and talks to it through a
//! command channel. State is read through watch channels, so every accessor
//! is cheap and never blocks on the driver.
//!
//! ```rust,no_run
//! use facility_stream::{FacilityStream, StreamConfig};
//! use facility_stream::feed::FilterParams;
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> facility_stream::Result<()> {
//! let streams = FacilityStream::new(StreamConfig::default())?;
//! let alerts = streams.alerts(FilterParams::default())?;
//! alerts.connect().await?;
//!
//! let mut updates = alerts.updates();
//! while let Some(snapshot) = updates.next().await {
//!     println!("{} alerts buffered", snapshot.items.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::aggregator::{Aggregator, FeedSnapshot};
use crate::config::StreamConfig;
use crate::connection::StreamConnection;
use crate::driver::{Command, Driver};
use crate::feed::{FeedPayload, StreamEndpoint};
use crate::transport::Transport;
use crate::types::{ConnectionStatus, Frame, Visibility};
use crate::{Result, StreamError};


/// Lifecycle callbacks for a feed.
///
/// Called from the driver task, in order, between state changes. Keep them
/// short; a slow observer delays the feed.
pub trait StreamObserver<T>: Send + Sync + 'static {
    /// The transport accepted the stream
    fn on_open(&self) {}

    /// `disconnect()` tore the session down
    fn on_close(&self) {}

    /// Connection loss, exhaustion, or a server error frame
    fn on_error(&self, _error: &StreamError) {}

    /// A domain frame was accepted, before it is batched
    fn on_message(&self, _frame: &Frame) {}

    /// A batch was flushed into the buffer
    fn on_batch(&self, _snapshot: &FeedSnapshot<T>) {}
}

impl<T> StreamObserver<T> for () {}

/// Handle to a running feed
pub struct Supervisor<T> {
    endpoint: StreamEndpoint,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    feed: watch::Receiver<Arc<FeedSnapshot<T>>>,
    cancel: CancellationToken,
}

impl<T: FeedPayload> Supervisor<T> {
    /// Spawn a feed with no observer. Must be called inside a tokio runtime.
    pub fn spawn<C: Transport>(
        transport: Arc<C>,
        endpoint: StreamEndpoint,
        config: &StreamConfig,
    ) -> Result<Self> {
        Self::spawn_with_observer(transport, endpoint, config, Arc::new(()))
    }

    /// Spawn a feed whose lifecycle is reported to `observer`
    pub fn spawn_with_observer<C: Transport>(
        transport: Arc<C>,
        endpoint: StreamEndpoint,
        config: &StreamConfig,
        observer: Arc<dyn StreamObserver<T>>,
    ) -> Result<Self> {
        config.validate()?;

        let connection = StreamConnection::new(transport, endpoint.url(), config.retry_policy())
            .with_auto_reconnect(config.auto_reconnect);
        let aggregator = Aggregator::new(config.buffer_size, config.throttle());

        debug!(kind = ?endpoint.kind(), url = %endpoint.url(), "Spawning feed");
        let channels = Driver::spawn(connection, aggregator, observer);

        Ok(Self {
            endpoint,
            commands: channels.commands,
            status: channels.status,
            feed: channels.feed,
            cancel: channels.cancel,
        })
    }

    /// Start a fresh session, superseding any active one
    pub async fn connect(&self) -> Result<()> {
        self.request(Command::Connect).await
    }

    /// Tear the session down and stop flushing. Idempotent.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(Command::Disconnect).await
    }

    /// Empty the buffer, latest payload and pending batch
    pub async fn clear_data(&self) -> Result<()> {
        self.request(Command::ClearData).await
    }

    /// Report a foreground/background change of the host application
    pub async fn set_visibility(&self, visibility: Visibility) -> Result<()> {
        self.request(|ack| Command::SetVisibility(visibility, ack)).await
    }

    async fn request(&self, command: impl FnOnce(oneshot::Sender<()>) -> Command) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands.send(command(ack_tx)).await.map_err(|_| StreamError::DriverStopped)?;
        ack_rx.await.map_err(|_| StreamError::DriverStopped)
    }

    pub fn endpoint(&self) -> &StreamEndpoint {
        &self.endpoint
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Current buffered data
    pub fn snapshot(&self) -> Arc<FeedSnapshot<T>> {
        Arc::clone(&self.feed.borrow())
    }

    /// Buffered payloads, oldest first
    pub fn data(&self) -> Vec<T> {
        self.feed.borrow().items.clone()
    }

    /// Last payload of the most recent flush
    pub fn latest(&self) -> Option<T> {
        self.feed.borrow().latest.clone()
    }

    /// Watch receiver notified once per flush or clear
    pub fn subscribe(&self) -> watch::Receiver<Arc<FeedSnapshot<T>>> {
        self.feed.clone()
    }

    /// Stream of snapshots, starting with the current one
    pub fn updates(&self) -> WatchStream<Arc<FeedSnapshot<T>>> {
        WatchStream::new(self.feed.clone())
    }

    /// Stream of status changes, starting with the current status
    pub fn status_updates(&self) -> WatchStream<ConnectionStatus> {
        WatchStream::new(self.status.clone())
    }
}

impl<T> Drop for Supervisor<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
