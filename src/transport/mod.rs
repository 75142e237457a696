//! Push-transport seam

use url::Url;

use crate::Result;
use crate::types::SseEvent;

pub mod codec;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod sse;

pub use codec::SseDecoder;
pub use sse::SseTransport;

/// Factory for push connections.
///
/// Transports abstract over how a server-initiated stream is carried (HTTP
/// Server-Sent Events in production, in-memory channels in tests). Opening
/// yields a [`TransportHandle`]; dropping the handle releases the connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    type Handle: TransportHandle;

    /// Open a connection to `url`
    ///
    /// Resolves once the server has accepted the stream. Returns:
    /// - `Ok(handle)` - Connection open, events can be read
    /// - `Err(e)` - Connection refused or handshake failed
    async fn open(&self, url: &Url) -> Result<Self::Handle>;
}

/// One open push connection
#[async_trait::async_trait]
pub trait TransportHandle: Send + 'static {
    /// Wait for the next event
    ///
    /// Returns:
    /// - `Ok(Some(event))` - Event received
    /// - `Ok(None)` - Server closed the stream
    /// - `Err(e)` - Connection dropped
    ///
    /// Must be cancel-safe: the driver races it against timers and commands,
    /// and a dropped call must not lose buffered events.
    async fn next_event(&mut self) -> Result<Option<SseEvent>>;
}
