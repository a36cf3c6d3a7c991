//! Tests for the global check registry

use netprobe::checks::{Check, CHECK_REGISTRY};

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn test_all_seven_checks_registered() {
    for name in [
        "dns",
        "ping",
        "ports",
        "bandwidth",
        "hostconfig",
        "conntrack",
        "iptables",
    ] {
        assert!(CHECK_REGISTRY.get(name).is_some(), "missing check {name}");
    }
}

#[test]
fn test_lookup_returns_matching_name() {
    for name in CHECK_REGISTRY.names() {
        let check = CHECK_REGISTRY.get(&name).unwrap();
        assert_eq!(check.name(), name);
    }
}

#[test]
fn test_unknown_check_is_none() {
    assert!(CHECK_REGISTRY.get("tcpdump").is_none());
    assert!(CHECK_REGISTRY.get("").is_none());
    assert!(CHECK_REGISTRY.get("DNS").is_none()); // names are case-sensitive
}

#[test]
fn test_names_sorted() {
    let names = CHECK_REGISTRY.names();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

// ============================================================================
// Contract flags
// ============================================================================

#[test]
fn test_local_flags() {
    for (name, expect_local) in [
        ("dns", false),
        ("ping", false),
        ("ports", false),
        ("bandwidth", false),
        ("hostconfig", true),
        ("conntrack", true),
        ("iptables", true),
    ] {
        let check = CHECK_REGISTRY.get(name).unwrap();
        assert_eq!(check.is_local(), expect_local, "{name}");
    }
}

#[test]
fn test_always_show_flags() {
    assert!(CHECK_REGISTRY.get("hostconfig").unwrap().always_show());
    assert!(CHECK_REGISTRY.get("bandwidth").unwrap().always_show());
    assert!(!CHECK_REGISTRY.get("dns").unwrap().always_show());
    assert!(!CHECK_REGISTRY.get("ports").unwrap().always_show());
}

#[test]
fn test_format_summary_handles_missing_details() {
    for name in CHECK_REGISTRY.names() {
        let check = CHECK_REGISTRY.get(&name).unwrap();
        // Never panic on absent or empty payloads
        let _ = check.format_summary(None, false);
        let _ = check.format_summary(Some(&serde_json::json!({})), true);
    }
}

// ============================================================================
// Concurrent reads
// ============================================================================

#[test]
fn test_concurrent_lookups() {
    let handles: Vec<_> = (0..8)
        .map(|_| {
            std::thread::spawn(|| {
                for _ in 0..1000 {
                    assert!(CHECK_REGISTRY.get("dns").is_some());
                    assert!(CHECK_REGISTRY.get("nonexistent").is_none());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
