//! Tests for coordinator diagnostics and run identifiers

use netprobe::coordinator::generate_run_id;
use netprobe::error::NetProbeError;
use std::collections::HashSet;

// ============================================================================
// Failure diagnostics (must stay distinguishable)
// ============================================================================

#[test]
fn test_ready_timeout_diagnostic() {
    let err = NetProbeError::ReadyTimeout {
        ready: 2,
        expected: 3,
    };
    assert_eq!(
        err.to_string(),
        "timeout waiting for agents to be ready (2/3 ready)"
    );
}

#[test]
fn test_run_timeout_diagnostic() {
    let err = NetProbeError::RunTimeout {
        complete: 1,
        expected: 3,
    };
    assert_eq!(
        err.to_string(),
        "timeout waiting for tests to complete (1/3 complete)"
    );
}

#[test]
fn test_cancellation_is_not_a_timeout() {
    let cancelled = NetProbeError::Cancelled.to_string();
    let timeout = NetProbeError::RunTimeout {
        complete: 0,
        expected: 1,
    }
    .to_string();

    assert_ne!(cancelled, timeout);
    assert!(!cancelled.contains("timeout"));
}

// ============================================================================
// Run identifiers
// ============================================================================

#[test]
fn test_run_ids_are_unique_and_nonempty() {
    let mut seen = HashSet::new();
    for _ in 0..100 {
        let id = generate_run_id();
        assert!(!id.is_empty());
        assert!(seen.insert(id), "duplicate run id");
    }
}

#[test]
fn test_run_id_is_printable_prefix_safe() {
    // The driver prints the first 8 characters of the run id
    let id = generate_run_id();
    assert!(id.len() >= 8);
    assert!(id.is_char_boundary(8));
}
