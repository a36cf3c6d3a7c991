//! Tests for the bandwidth pair planner

use netprobe::coordinator::generate_bandwidth_pairs;
use netprobe::types::TargetNode;

fn target(node: &str) -> TargetNode {
    TargetNode {
        node_name: node.to_string(),
        pod_name: format!("netprobe-{node}"),
        ip: format!("10.0.0.{}", node.as_bytes()[0]),
        is_controlplane: false,
    }
}

#[test]
fn test_pair_counts_match_formula() {
    for n in 0..8usize {
        let targets: Vec<TargetNode> = (0..n).map(|i| target(&format!("node-{i}"))).collect();
        let pairs = generate_bandwidth_pairs(&targets);
        assert_eq!(pairs.len(), n * n.saturating_sub(1) / 2, "n = {n}");
    }
}

#[test]
fn test_three_workers_triangulate() {
    let targets = vec![target("a"), target("b"), target("c")];
    let pairs = generate_bandwidth_pairs(&targets);

    let names: Vec<(&str, &str)> = pairs
        .iter()
        .map(|(a, b)| (a.node_name.as_str(), b.node_name.as_str()))
        .collect();
    assert_eq!(names, vec![("a", "b"), ("a", "c"), ("b", "c")]);
}

#[test]
fn test_input_order_does_not_matter() {
    let sorted = generate_bandwidth_pairs(&[target("a"), target("b"), target("c")]);
    let shuffled = generate_bandwidth_pairs(&[target("c"), target("a"), target("b")]);

    let names = |pairs: &[(TargetNode, TargetNode)]| {
        pairs
            .iter()
            .map(|(a, b)| (a.node_name.clone(), b.node_name.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&sorted), names(&shuffled));
}

#[test]
fn test_pairs_are_unordered_unique() {
    let targets: Vec<TargetNode> = (0..6).map(|i| target(&format!("node-{i}"))).collect();
    let pairs = generate_bandwidth_pairs(&targets);

    let mut seen = std::collections::HashSet::new();
    for (a, b) in &pairs {
        assert_ne!(a.node_name, b.node_name, "self-pair emitted");
        let mut key = [a.node_name.clone(), b.node_name.clone()];
        key.sort();
        assert!(seen.insert(key), "duplicate unordered pair");
    }
    assert_eq!(seen.len(), 15);
}

#[test]
fn test_pair_carries_full_targets() {
    let mut cp = target("a");
    cp.is_controlplane = true;
    let pairs = generate_bandwidth_pairs(&[cp, target("b")]);

    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].0.is_controlplane);
    assert_eq!(pairs[0].1.pod_name, "netprobe-b");
}
