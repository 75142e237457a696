//! Gateway wire format: SSE body to typed payloads, and request URLs

use facility_stream::demux::{Demultiplexer, Dispatch};
use facility_stream::transport::SseDecoder;
use facility_stream::{
    EquipmentStatusEvent, EventKind, FeedKind, FilterParams, MeasurementEvent, Severity,
    StreamEndpoint, StreamEvent,
};

const BODY: &str = "\
: connected\n\
\n\
event: measurement\n\
id: 41\n\
data: {\"eventType\":\"measurement\",\"eventId\":\"41\",\"timestamp\":\"2024-05-01T10:00:00.123\",\n\
data: \"data\":{\"id\":\"m-41\",\"capteurId\":\"s-3\",\"parameterType\":\"HUMIDITY\",\"value\":64.2,\"unit\":\"%\",\"greenhouseId\":\"gh-1\"}}\n\
\n\
event: keep-alive\n\
data: {\"eventType\":\"keep-alive\",\"eventId\":\"\",\"data\":\"ping\"}\n\
\n\
event: equipment-status\n\
data: {\"eventType\":\"equipment-status\",\"eventId\":\"42\",\"data\":{\"id\":\"e-1\",\"equipmentName\":\"Fan 2\",\"status\":\"ON\",\"previousStatus\":\"OFF\",\"triggeredBy\":\"AUTOMATIC\"}}\n\
\n\
event: error\n\
data: {\"error\":\"Too many subscribers\"}\n\
\n";

fn decode_in_chunks(size: usize) -> Vec<facility_stream::SseEvent> {
    let mut decoder = SseDecoder::new();
    let mut events = Vec::new();
    for chunk in BODY.as_bytes().chunks(size) {
        events.extend(decoder.feed(chunk).unwrap());
    }
    decoder.finish();
    events
}

#[test]
fn chunking_does_not_change_the_events() {
    let whole = decode_in_chunks(BODY.len());
    assert_eq!(whole.len(), 4);
    for size in [1, 2, 7, 64] {
        assert_eq!(decode_in_chunks(size), whole, "chunk size {size}");
    }
}

#[test]
fn body_cut_mid_event_yields_only_complete_events() {
    let cut = BODY.find("event: error").unwrap() + "event: error\ndata: {\"err".len();
    let mut decoder = SseDecoder::new();
    let events = decoder.feed(&BODY.as_bytes()[..cut]).unwrap();
    decoder.finish();

    assert_eq!(events.len(), 3);
    assert_eq!(events[2].event.as_deref(), Some("equipment-status"));
}

#[test]
fn combined_feed_classifies_a_real_body() {
    let demux = Demultiplexer::<StreamEvent>::new();
    let dispatched: Vec<_> = decode_in_chunks(16).iter().map(|e| demux.classify(e)).collect();

    match &dispatched[0] {
        Dispatch::Deliver { frame, kind, payload: StreamEvent::Measurement(m) } => {
            assert_eq!(*kind, EventKind::Measurement);
            assert!(frame.parsed_timestamp().is_some());
            assert_eq!(m.sensor_id.as_deref(), Some("s-3"));
            assert_eq!(m.value, Some(64.2));
            assert_eq!(m.facility_id.as_deref(), Some("gh-1"));
        }
        other => panic!("expected measurement, got {other:?}"),
    }
    assert!(matches!(dispatched[1], Dispatch::KeepAlive));
    match &dispatched[2] {
        Dispatch::Deliver { payload: StreamEvent::EquipmentStatus(e), .. } => {
            assert_eq!(e.status.as_deref(), Some("ON"));
            assert_eq!(e.previous_status.as_deref(), Some("OFF"));
        }
        other => panic!("expected equipment status, got {other:?}"),
    }
    assert!(matches!(&dispatched[3], Dispatch::ServerError(m) if m == "Too many subscribers"));
}

#[test]
fn typed_feeds_skip_other_kinds() {
    let events = decode_in_chunks(32);

    let measurements = Demultiplexer::<MeasurementEvent>::new();
    assert!(matches!(measurements.classify(&events[0]), Dispatch::Deliver { .. }));
    assert!(matches!(measurements.classify(&events[2]), Dispatch::Ignored { .. }));

    let equipment = Demultiplexer::<EquipmentStatusEvent>::new();
    assert!(matches!(equipment.classify(&events[0]), Dispatch::Ignored { .. }));
    assert!(matches!(equipment.classify(&events[2]), Dispatch::Deliver { .. }));
}

#[test]
fn endpoints_send_only_the_filters_they_understand() {
    let filters = FilterParams::new()
        .parameter_type("TEMPERATURE")
        .severity(Severity::Warning)
        .equipment_type("PUMP")
        .facility("gh-7");

    let url = |kind| StreamEndpoint::new("https://gw.example/base/", kind, filters.clone()).unwrap().url();

    let measurements = url(FeedKind::Measurements);
    assert_eq!(measurements.path(), "/base/api/stream/measurements");
    assert_eq!(measurements.query(), Some("parameterType=TEMPERATURE&greenhouseId=gh-7"));

    assert_eq!(url(FeedKind::Alerts).query(), Some("severity=WARNING&greenhouseId=gh-7"));
    assert_eq!(
        url(FeedKind::EquipmentStatus).query(),
        Some("equipmentType=PUMP&greenhouseId=gh-7")
    );
    assert_eq!(url(FeedKind::Combined).query(), Some("greenhouseId=gh-7"));
}

#[test]
fn non_http_base_urls_are_rejected() {
    assert!(StreamEndpoint::new("ftp://gw.example", FeedKind::Alerts, FilterParams::new()).is_err());
    assert!(StreamEndpoint::new("not a url", FeedKind::Alerts, FilterParams::new()).is_err());
}
