//! Resilient client for a facility monitoring gateway's event streams.
//!
//! The gateway pushes sensor measurements, alerts and equipment status changes
//! as Server-Sent Events. This crate keeps a subscription to those streams alive
//! across network failures and hands consumers bounded, burst-coalesced batches
//! instead of one notification per frame.
//!
//! # Features
//!
//! - **Resilient sessions**: exponential backoff with jitter and a retry budget
//! - **Typed feeds**: measurements, alerts, equipment status, or everything at once
//! - **Burst coalescing**: frames are flushed to consumers on a fixed cadence
//! - **Bounded memory**: each feed keeps only its most recent payloads
//!
//! # Architecture
//!
//! Each feed is a [`Supervisor`] handle over one spawned driver task. The driver
//! owns the [`connection::StreamConnection`] state machine and the
//! [`aggregator::Aggregator`], and serializes commands, transport events and
//! flush ticks through a single `select!` loop. Consumers read state through
//! watch channels.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use facility_stream::{FacilityStream, StreamConfig};
//! use facility_stream::feed::FilterParams;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> facility_stream::Result<()> {
//!     let streams = FacilityStream::new(StreamConfig::default())?;
//!     let temperature = streams.measurements(FilterParams::new().parameter_type("TEMPERATURE"))?;
//!     temperature.connect().await?;
//!
//!     let mut updates = temperature.updates();
//!     while let Some(snapshot) = updates.next().await {
//!         if let Some(latest) = &snapshot.latest {
//!             println!("{:?} {:?}", latest.value, latest.unit);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
pub mod types;

// Session and delivery pipeline
pub mod aggregator;
pub mod buffer;
pub mod connection;
pub mod demux;
pub mod driver;
pub mod retry;
pub mod supervisor;

// Wire access and configuration
pub mod config;
pub mod feed;
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use aggregator::FeedSnapshot;
pub use config::StreamConfig;
pub use feed::{FeedKind, FeedPayload, FilterParams, StreamEndpoint};
pub use retry::RetryPolicy;
pub use supervisor::{StreamObserver, Supervisor};
pub use transport::SseTransport;

use std::sync::Arc;

/// Entry point for the gateway's feeds.
///
/// Holds the configuration and one HTTP client shared by every feed created
/// from it. Feeds are spawned idle; call [`Supervisor::connect`] to start them.
///
/// # Examples
///
/// ```rust,no_run
/// use facility_stream::FacilityStream;
/// use facility_stream::feed::FilterParams;
/// use facility_stream::types::Severity;
///
/// # #[tokio::main]
/// # async fn main() -> facility_stream::Result<()> {
/// let streams = FacilityStream::from_env()?;
/// let critical = streams.alerts(FilterParams::new().severity(Severity::Critical))?;
/// critical.connect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FacilityStream {
    config: StreamConfig,
    transport: Arc<SseTransport>,
}

impl FacilityStream {
    /// Build the shared client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: StreamConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(SseTransport::new(config.connect_timeout())?);
        Ok(Self { config, transport })
    }

    /// Build from `FACILITY_STREAM_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(StreamConfig::from_env()?)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Sensor readings, filterable by parameter type and facility
    pub fn measurements(&self, filters: FilterParams) -> Result<Supervisor<MeasurementEvent>> {
        self.feed(FeedKind::Measurements, filters)
    }

    /// Alerts, filterable by severity and facility
    pub fn alerts(&self, filters: FilterParams) -> Result<Supervisor<AlertEvent>> {
        self.feed(FeedKind::Alerts, filters)
    }

    /// Equipment transitions, filterable by equipment type and facility
    pub fn equipment_status(
        &self,
        filters: FilterParams,
    ) -> Result<Supervisor<EquipmentStatusEvent>> {
        self.feed(FeedKind::EquipmentStatus, filters)
    }

    /// Every domain event, optionally for a single facility
    pub fn combined(&self, facility_id: Option<&str>) -> Result<Supervisor<StreamEvent>> {
        let filters = match facility_id {
            Some(id) => FilterParams::new().facility(id),
            None => FilterParams::new(),
        };
        self.feed(FeedKind::Combined, filters)
    }

    /// Any feed with any payload type.
    ///
    /// Filters the endpoint does not understand are dropped.
    pub fn feed<T: FeedPayload>(&self, kind: FeedKind, filters: FilterParams) -> Result<Supervisor<T>> {
        self.feed_with_observer(kind, filters, Arc::new(()))
    }

    /// Like [`FacilityStream::feed`], reporting lifecycle events to `observer`
    pub fn feed_with_observer<T: FeedPayload>(
        &self,
        kind: FeedKind,
        filters: FilterParams,
        observer: Arc<dyn StreamObserver<T>>,
    ) -> Result<Supervisor<T>> {
        let endpoint = StreamEndpoint::new(&self.config.base_url, kind, filters)?;
        Supervisor::spawn_with_observer(Arc::clone(&self.transport), endpoint, &self.config, observer)
    }
}
