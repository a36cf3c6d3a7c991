//! Tests for the event wire format

use netprobe::types::{Event, EventType};
use serde_json::{json, Value};

// ============================================================================
// Wire shape
// ============================================================================

#[test]
fn test_event_types_on_the_wire() {
    let cases = [
        (EventType::Ready, "ready"),
        (EventType::TestStart, "test_start"),
        (EventType::TestResult, "test_result"),
        (EventType::Complete, "complete"),
        (EventType::Error, "error"),
    ];

    for (event_type, wire) in cases {
        let value = serde_json::to_value(event_type).unwrap();
        assert_eq!(value, json!(wire));
    }
}

#[test]
fn test_result_event_full_shape() {
    let details = json!({"ports": [{"port": 6443, "protocol": "tcp", "open": true}]});
    let mut event = Event::test_result(
        "node-1",
        "netprobe-xyz",
        "ports",
        "node-2",
        "fail",
        Some(details),
        "run-42",
    );
    event.error = Some("6443/tcp:kube-apiserver".to_string());

    let value: Value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "test_result");
    assert_eq!(value["node"], "node-1");
    assert_eq!(value["pod"], "netprobe-xyz");
    assert_eq!(value["check"], "ports");
    assert_eq!(value["target"], "node-2");
    assert_eq!(value["status"], "fail");
    assert_eq!(value["error"], "6443/tcp:kube-apiserver");
    assert_eq!(value["run_id"], "run-42");
    assert!(value["timestamp"].is_string());
    assert_eq!(value["details"]["ports"][0]["port"], 6443);
}

#[test]
fn test_optional_fields_omitted() {
    let event = Event::ready("node-1", "pod-1", "run-1");
    let value: Value = serde_json::to_value(&event).unwrap();

    for absent in ["check", "target", "status", "error", "details", "network"] {
        assert!(value.get(absent).is_none(), "{absent} should be omitted");
    }
}

#[test]
fn test_timestamp_is_rfc3339() {
    let event = Event::ready("node-1", "pod-1", "run-1");
    let value: Value = serde_json::to_value(&event).unwrap();
    let ts = value["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
}

// ============================================================================
// Line-stream parsing (what the log-tail ingestor does)
// ============================================================================

#[test]
fn test_parse_one_event_per_line() {
    let lines = [
        serde_json::to_string(&Event::ready("n", "p", "r")).unwrap(),
        "starting agent on node n".to_string(), // agents may print plain text
        serde_json::to_string(&Event::complete("n", "p", json!({}), "r")).unwrap(),
    ];

    let parsed: Vec<Event> = lines
        .iter()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].event_type, EventType::Ready);
    assert_eq!(parsed[1].event_type, EventType::Complete);
}

#[test]
fn test_round_trip_preserves_run_id() {
    let event = Event::test_start("node-1", "pod-1", "ping", "node-2", "run-abc");
    let line = serde_json::to_string(&event).unwrap();
    let parsed: Event = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed.run_id, "run-abc");
    assert_eq!(parsed.check.as_deref(), Some("ping"));
}

#[test]
fn test_foreign_json_line_is_rejected() {
    // A structured but non-event line must not parse into an Event
    assert!(serde_json::from_str::<Event>(r#"{"level":"info","msg":"hello"}"#).is_err());
}
