//! Server-Sent Events over HTTP

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::codec::SseDecoder;
use super::{Transport, TransportHandle};
use crate::types::SseEvent;
use crate::{Result, StreamError};

/// HTTP transport speaking `text/event-stream`.
///
/// One `reqwest::Client` is shared by every feed built from the same
/// transport; each open produces an independent streaming response.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    /// Build a transport with a connect timeout.
    ///
    /// No overall request timeout is set: the response body is expected to
    /// stay open indefinitely.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("facility-stream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StreamError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Use an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for SseTransport {
    type Handle = SseHandle;

    async fn open(&self, url: &Url) -> Result<SseHandle> {
        debug!("Opening event stream: {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            warn!(content_type, "Stream endpoint did not answer with text/event-stream");
        }

        info!(status = %response.status(), "Event stream opened");

        Ok(SseHandle {
            body: response.bytes_stream().boxed(),
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
            finished: false,
        })
    }
}

/// Open HTTP event stream. Dropping it closes the connection.
pub struct SseHandle {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    ready: VecDeque<SseEvent>,
    finished: bool,
}

#[async_trait::async_trait]
impl TransportHandle for SseHandle {
    async fn next_event(&mut self) -> Result<Option<SseEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            match self.body.next().await {
                Some(Ok(chunk)) => {
                    trace!("Received {} byte chunk", chunk.len());
                    let events = self.decoder.feed(&chunk)?;
                    self.ready.extend(events);
                }
                Some(Err(e)) => {
                    return Err(StreamError::transport_with_source(
                        "event stream interrupted",
                        Box::new(e),
                    ));
                }
                None => {
                    debug!("Event stream body ended");
                    self.finished = true;
                    self.decoder.finish();
                }
            }
        }
    }
}
