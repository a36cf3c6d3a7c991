//! Tests for the coordinator's event aggregator

use netprobe::coordinator::Aggregator;
use netprobe::types::{Event, EventType};
use serde_json::json;

fn expected(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Per-agent event sequence
// ============================================================================

#[test]
fn test_full_agent_sequence() {
    let agg = Aggregator::new(&expected(&["pod-a"]));

    agg.add_event(Event::ready("node-a", "pod-a", "run-1"));
    agg.add_event(Event::test_start("node-a", "pod-a", "dns", "dns-test", "run-1"));
    agg.add_event(Event::test_result(
        "node-a", "pod-a", "dns", "dns-test", "pass", None, "run-1",
    ));
    agg.add_event(Event::test_start("node-a", "pod-a", "ping", "node-b", "run-1"));
    agg.add_event(Event::test_result(
        "node-a", "pod-a", "ping", "node-b", "pass", None, "run-1",
    ));
    agg.add_event(Event::complete("node-a", "pod-a", json!({}), "run-1"));

    let events = agg.events();
    assert_eq!(events.len(), 6);
    assert_eq!(events.first().unwrap().event_type, EventType::Ready);
    assert_eq!(events.last().unwrap().event_type, EventType::Complete);
    assert!(agg.all_ready());
    assert!(agg.all_complete());
    assert_eq!(agg.result_events().len(), 2);
}

// ============================================================================
// Readiness and completion counting
// ============================================================================

#[test]
fn test_partial_readiness_counts() {
    let agg = Aggregator::new(&expected(&["pod-a", "pod-b", "pod-c"]));

    agg.add_event(Event::ready("node-a", "pod-a", "r"));
    agg.add_event(Event::ready("node-b", "pod-b", "r"));

    assert!(!agg.all_ready());
    assert_eq!(agg.ready_count(), 2);
    assert_eq!(agg.expected_count(), 3);
    assert_eq!(agg.events().len(), 2);
}

#[test]
fn test_duplicate_ready_events_count_once() {
    let agg = Aggregator::new(&expected(&["pod-a", "pod-b"]));

    agg.add_event(Event::ready("node-a", "pod-a", "r"));
    agg.add_event(Event::ready("node-a", "pod-a", "r"));

    assert_eq!(agg.ready_count(), 1);
    assert_eq!(agg.events().len(), 2); // log keeps both
}

#[test]
fn test_unexpected_agent_does_not_satisfy_gate() {
    let agg = Aggregator::new(&expected(&["pod-a"]));

    agg.add_event(Event::ready("node-z", "pod-z", "r"));
    assert!(!agg.all_ready());
    assert_eq!(agg.ready_count(), 1); // tracked, but not expected
}

#[test]
fn test_completion_monotonic_across_later_events() {
    let agg = Aggregator::new(&expected(&["pod-a"]));

    agg.add_event(Event::complete("node-a", "pod-a", json!({}), "r"));
    assert!(agg.all_complete());

    for _ in 0..10 {
        agg.add_event(Event::error("node-a", "pod-a", "noise", "r"));
        assert!(agg.all_complete());
    }
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_error_snapshot() {
    let agg = Aggregator::new(&expected(&["pod-a"]));
    agg.add_event(Event::error("node-a", "pod-a", "watch failed", "r"));
    agg.add_event(Event::ready("node-a", "pod-a", "r"));

    let errors = agg.error_events();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error.as_deref(), Some("watch failed"));
}

#[test]
fn test_snapshot_is_a_copy() {
    let agg = Aggregator::new(&expected(&["pod-a"]));
    agg.add_event(Event::ready("node-a", "pod-a", "r"));

    let snapshot = agg.events();
    agg.add_event(Event::complete("node-a", "pod-a", json!({}), "r"));

    assert_eq!(snapshot.len(), 1);
    assert_eq!(agg.events().len(), 2);
}
