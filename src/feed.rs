//! Feed parametrization.
//!
//! The four consumer-facing feeds (measurements, alerts, equipment status and
//! the combined feed) share one engine. What differs between them is captured
//! here: the endpoint path ([`FeedKind`]), the query filters ([`FilterParams`])
//! and the payload type the feed decodes ([`FeedPayload`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{
    AlertEvent, EquipmentStatusEvent, EventKind, MeasurementEvent, Severity, StreamEvent,
};
use crate::{Result, StreamError};

/// Which gateway stream a feed subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedKind {
    Measurements,
    Alerts,
    EquipmentStatus,
    Combined,
}

impl FeedKind {
    /// Path of this feed below the base address
    pub fn path(self) -> &'static str {
        match self {
            FeedKind::Measurements => "/api/stream/measurements",
            FeedKind::Alerts => "/api/stream/alerts",
            FeedKind::EquipmentStatus => "/api/stream/equipment-status",
            FeedKind::Combined => "/api/stream/all",
        }
    }
}

/// Query filters scoping the events a feed receives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Measured parameter (temperature, humidity, ...)
    pub parameter_type: Option<String>,
    pub severity: Option<Severity>,
    /// Equipment family (VENTILATOR, HEATER, ...)
    pub equipment_type: Option<String>,
    pub facility_id: Option<String>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter_type(mut self, parameter_type: impl Into<String>) -> Self {
        self.parameter_type = Some(parameter_type.into());
        self
    }

    /// Alert tier, either a [`Severity`] or its wire name (`"HIGH"`)
    pub fn severity(mut self, severity: impl Into<Severity>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn equipment_type(mut self, equipment_type: impl Into<String>) -> Self {
        self.equipment_type = Some(equipment_type.into());
        self
    }

    pub fn facility(mut self, facility_id: impl Into<String>) -> Self {
        self.facility_id = Some(facility_id.into());
        self
    }

    /// Drop the filters the given feed's endpoint does not understand
    pub fn scoped_to(self, kind: FeedKind) -> Self {
        let facility_id = self.facility_id;
        match kind {
            FeedKind::Measurements => {
                Self { parameter_type: self.parameter_type, facility_id, ..Self::default() }
            }
            FeedKind::Alerts => Self { severity: self.severity, facility_id, ..Self::default() },
            FeedKind::EquipmentStatus => {
                Self { equipment_type: self.equipment_type, facility_id, ..Self::default() }
            }
            FeedKind::Combined => Self { facility_id, ..Self::default() },
        }
    }

    /// Query pairs in wire naming, only for the filters that are set
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(parameter_type) = &self.parameter_type {
            pairs.push(("parameterType", parameter_type.clone()));
        }
        if let Some(severity) = &self.severity {
            pairs.push(("severity", severity.to_string()));
        }
        if let Some(equipment_type) = &self.equipment_type {
            pairs.push(("equipmentType", equipment_type.clone()));
        }
        if let Some(facility_id) = &self.facility_id {
            pairs.push(("greenhouseId", facility_id.clone()));
        }
        pairs
    }
}

/// Fully resolved address of one feed.
///
/// Immutable: a different filter set needs a new endpoint and a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    base: Url,
    kind: FeedKind,
    filters: FilterParams,
}

impl StreamEndpoint {
    pub fn new(base_url: &str, kind: FeedKind, filters: FilterParams) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| StreamError::endpoint(base_url, e.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(StreamError::endpoint(base_url, "expected an absolute http(s) URL"));
        }
        Ok(Self { base, kind, filters: filters.scoped_to(kind) })
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn filters(&self) -> &FilterParams {
        &self.filters
    }

    /// URL the transport connects to
    pub fn url(&self) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{}", self.kind.path()));
        url.set_query(None);

        let pairs = self.filters.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        url
    }
}

/// Payload type of a feed.
///
/// A strategy for turning frame payloads into typed items. Each specialized
/// feed is the shared engine instantiated with one of these.
pub trait FeedPayload: Clone + Send + Sync + 'static {
    /// Whether frames of `kind` belong in this feed
    fn accepts(kind: EventKind) -> bool;

    /// Decode a frame payload of an accepted kind
    fn decode(kind: EventKind, data: &serde_json::Value) -> Result<Self>;
}

fn decode_as<T: DeserializeOwned>(data: &serde_json::Value) -> Result<T> {
    Ok(T::deserialize(data)?)
}

impl FeedPayload for MeasurementEvent {
    fn accepts(kind: EventKind) -> bool {
        kind == EventKind::Measurement
    }

    fn decode(_kind: EventKind, data: &serde_json::Value) -> Result<Self> {
        decode_as(data)
    }
}

impl FeedPayload for AlertEvent {
    fn accepts(kind: EventKind) -> bool {
        kind == EventKind::Alert
    }

    fn decode(_kind: EventKind, data: &serde_json::Value) -> Result<Self> {
        decode_as(data)
    }
}

impl FeedPayload for EquipmentStatusEvent {
    fn accepts(kind: EventKind) -> bool {
        kind == EventKind::EquipmentStatus
    }

    fn decode(_kind: EventKind, data: &serde_json::Value) -> Result<Self> {
        decode_as(data)
    }
}

impl FeedPayload for StreamEvent {
    fn accepts(kind: EventKind) -> bool {
        kind.is_domain()
    }

    fn decode(kind: EventKind, data: &serde_json::Value) -> Result<Self> {
        match kind {
            EventKind::Measurement => decode_as(data).map(StreamEvent::Measurement),
            EventKind::Alert => decode_as(data).map(StreamEvent::Alert),
            EventKind::EquipmentStatus => decode_as(data).map(StreamEvent::EquipmentStatus),
            other => Err(StreamError::protocol(format!("'{other}' frames carry no domain payload"))),
        }
    }
}

/// Untyped feed: any domain payload as raw JSON
impl FeedPayload for serde_json::Value {
    fn accepts(kind: EventKind) -> bool {
        kind.is_domain()
    }

    fn decode(_kind: EventKind, data: &serde_json::Value) -> Result<Self> {
        Ok(data.clone())
    }
}
