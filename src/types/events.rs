//! Domain event payloads carried by the stream

use serde::{Deserialize, Serialize};
use std::fmt;

/// Event kinds recognized on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Measurement,
    Alert,
    EquipmentStatus,
    KeepAlive,
    Error,
}

impl EventKind {
    /// All kinds that carry domain payloads
    pub const DOMAIN: [EventKind; 3] =
        [EventKind::Measurement, EventKind::Alert, EventKind::EquipmentStatus];

    /// Wire name of this kind
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Measurement => "measurement",
            EventKind::Alert => "alert",
            EventKind::EquipmentStatus => "equipment-status",
            EventKind::KeepAlive => "keep-alive",
            EventKind::Error => "error",
        }
    }

    /// Look up a kind by wire name
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "measurement" => Some(EventKind::Measurement),
            "alert" => Some(EventKind::Alert),
            "equipment-status" => Some(EventKind::EquipmentStatus),
            "keep-alive" => Some(EventKind::KeepAlive),
            "error" => Some(EventKind::Error),
            _ => None,
        }
    }

    /// Whether frames of this kind carry a domain payload
    pub fn is_domain(self) -> bool {
        Self::DOMAIN.contains(&self)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity as sent by the gateway.
///
/// The gateway forwards whatever tier the producing service assigned, so the
/// set is open: unrecognized names are kept verbatim in [`Severity::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Info,
    Low,
    Medium,
    #[default]
    Warning,
    High,
    Critical,
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::Warning => "WARNING",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
            Severity::Other(name) => name,
        }
    }

    /// Relative urgency, `None` for unrecognized tiers
    ///
    /// `WARNING` and `MEDIUM` share a rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Severity::Info => Some(0),
            Severity::Low => Some(1),
            Severity::Medium | Severity::Warning => Some(2),
            Severity::High => Some(3),
            Severity::Critical => Some(4),
            Severity::Other(_) => None,
        }
    }
}

impl From<String> for Severity {
    fn from(name: String) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "INFO" => Severity::Info,
            "LOW" => Severity::Low,
            "MEDIUM" => Severity::Medium,
            "WARNING" => Severity::Warning,
            "HIGH" => Severity::High,
            "CRITICAL" => Severity::Critical,
            _ => Severity::Other(name),
        }
    }
}

impl From<&str> for Severity {
    fn from(name: &str) -> Self {
        Severity::from(name.to_string())
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementEvent {
    pub id: String,
    #[serde(rename = "capteurId", alias = "sensorId", default)]
    pub sensor_id: Option<String>,
    #[serde(rename = "capteurName", alias = "sensorName", default)]
    pub sensor_name: Option<String>,
    #[serde(default)]
    pub parameter_type: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "greenhouseId", alias = "facilityId", default)]
    pub facility_id: Option<String>,
    #[serde(rename = "greenhouseName", alias = "facilityName", default)]
    pub facility_name: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub zone_name: Option<String>,
}

/// A threshold violation or other alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub id: String,
    #[serde(rename = "type", default)]
    pub alert_type: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub parameter_type: Option<String>,
    #[serde(default)]
    pub current_value: Option<f64>,
    #[serde(default)]
    pub threshold_value: Option<f64>,
    #[serde(rename = "greenhouseId", alias = "facilityId", default)]
    pub facility_id: Option<String>,
    #[serde(rename = "greenhouseName", alias = "facilityName", default)]
    pub facility_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub acknowledged: Option<bool>,
}

/// A transition of an actuated piece of equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentStatusEvent {
    pub id: String,
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(default)]
    pub equipment_name: Option<String>,
    #[serde(default)]
    pub equipment_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub previous_status: Option<String>,
    #[serde(rename = "greenhouseId", alias = "facilityId", default)]
    pub facility_id: Option<String>,
    #[serde(rename = "greenhouseName", alias = "facilityName", default)]
    pub facility_name: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub zone_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub triggered_by: Option<String>,
}

/// Any domain event, as delivered by the combined feed
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Measurement(MeasurementEvent),
    Alert(AlertEvent),
    EquipmentStatus(EquipmentStatusEvent),
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Measurement(_) => EventKind::Measurement,
            StreamEvent::Alert(_) => EventKind::Alert,
            StreamEvent::EquipmentStatus(_) => EventKind::EquipmentStatus,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            StreamEvent::Measurement(e) => &e.id,
            StreamEvent::Alert(e) => &e.id,
            StreamEvent::EquipmentStatus(e) => &e.id,
        }
    }

    pub fn facility_id(&self) -> Option<&str> {
        match self {
            StreamEvent::Measurement(e) => e.facility_id.as_deref(),
            StreamEvent::Alert(e) => e.facility_id.as_deref(),
            StreamEvent::EquipmentStatus(e) => e.facility_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names_round_trip() {
        for kind in [
            EventKind::Measurement,
            EventKind::Alert,
            EventKind::EquipmentStatus,
            EventKind::KeepAlive,
            EventKind::Error,
        ] {
            assert_eq!(EventKind::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_wire("heartbeat"), None);
        assert!(!EventKind::KeepAlive.is_domain());
        assert!(EventKind::EquipmentStatus.is_domain());
    }

    #[test]
    fn alert_decodes_with_gateway_field_names() {
        let alert: AlertEvent = serde_json::from_value(json!({
            "id": "a-1",
            "type": "THRESHOLD_EXCEEDED",
            "severity": "CRITICAL",
            "currentValue": 41.2,
            "thresholdValue": 35.0,
            "greenhouseId": "gh-7",
            "acknowledged": false
        }))
        .unwrap();

        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.alert_type.as_deref(), Some("THRESHOLD_EXCEEDED"));
        assert_eq!(alert.facility_id.as_deref(), Some("gh-7"));
        assert!(Severity::Critical.rank() > Severity::Warning.rank());
    }

    #[test]
    fn upstream_severity_tiers_decode() {
        for (wire, expected) in [
            ("HIGH", Severity::High),
            ("MEDIUM", Severity::Medium),
            ("LOW", Severity::Low),
            ("low", Severity::Low),
            ("SEVERE", Severity::Other("SEVERE".into())),
        ] {
            let alert: AlertEvent =
                serde_json::from_value(json!({"id": "a-3", "severity": wire})).unwrap();
            assert_eq!(alert.severity, expected, "{wire}");
        }

        let unknown = Severity::from("SEVERE");
        assert_eq!(unknown.rank(), None);
        assert_eq!(serde_json::to_value(&unknown).unwrap(), json!("SEVERE"));
        assert_eq!(serde_json::to_value(Severity::High).unwrap(), json!("HIGH"));
        assert!(Severity::High.rank() > Severity::Medium.rank());
    }

    #[test]
    fn missing_severity_defaults_to_warning() {
        let alert: AlertEvent = serde_json::from_value(json!({"id": "a-2"})).unwrap();
        assert_eq!(alert.severity, Severity::Warning);
    }

    #[test]
    fn nullable_fields_accept_null() {
        let m: MeasurementEvent = serde_json::from_value(json!({
            "id": "m-1",
            "capteurId": null,
            "value": null,
            "zoneName": "north"
        }))
        .unwrap();
        assert!(m.sensor_id.is_none());
        assert!(m.value.is_none());
        assert_eq!(m.zone_name.as_deref(), Some("north"));
    }

    #[test]
    fn equipment_status_carries_transition() {
        let e: EquipmentStatusEvent = serde_json::from_value(json!({
            "id": "e-1",
            "equipmentType": "VENTILATOR",
            "status": "ON",
            "previousStatus": "OFF"
        }))
        .unwrap();
        let event = StreamEvent::EquipmentStatus(e);
        assert_eq!(event.kind(), EventKind::EquipmentStatus);
        assert_eq!(event.id(), "e-1");
        assert!(event.facility_id().is_none());
    }
}
