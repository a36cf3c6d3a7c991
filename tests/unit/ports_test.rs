//! Tests for the port catalog and the ports probe against live sockets

use netprobe::checks::{run_with_timeout, PortsCheck};
use netprobe::types::{
    default_ports, filter_ports_for_role, parse_port_spec, CheckStatus, NodeRole, PortSpec,
    Protocol,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Catalog filtering
// ============================================================================

#[test]
fn test_catalog_for_worker_node_is_kubelet_only() {
    let filtered = filter_ports_for_role(&default_ports(), false);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].name, "kubelet");
    assert_eq!(filtered[0].port, 10250);
}

#[test]
fn test_catalog_for_control_plane_is_complete() {
    let filtered = filter_ports_for_role(&default_ports(), true);
    let names: Vec<&str> = filtered.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "kubelet",
            "kube-apiserver",
            "rke2-supervisor",
            "etcd-client",
            "etcd-peer"
        ]
    );
}

#[test]
fn test_parse_port_spec_round_trip() {
    let spec = parse_port_spec("10250/tcp:kubelet").unwrap();
    assert_eq!(spec.port, 10250);
    assert_eq!(spec.protocol, Protocol::Tcp);
    assert_eq!(spec.name, "kubelet");
}

// ============================================================================
// Live probes
// ============================================================================

#[tokio::test]
async fn test_tcp_listener_is_open_and_high_port_is_closed() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_port = listener.local_addr().unwrap().port();
    let closed_port = 52000 + (open_port % 1000);

    let check = PortsCheck::new(vec![
        PortSpec::new(open_port, Protocol::Tcp, "listener", NodeRole::All),
        PortSpec::new(closed_port, Protocol::Tcp, "unused", NodeRole::All),
    ]);

    let cancel = CancellationToken::new();
    let result = run_with_timeout(&check, &cancel, "127.0.0.1", Duration::from_secs(10)).await;

    assert_eq!(result.status, CheckStatus::Fail);
    let failed = result.details["failed_ports"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0]
        .as_str()
        .unwrap()
        .starts_with(&format!("{closed_port}/tcp")));
}

#[tokio::test]
async fn test_all_open_ports_pass() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let check = PortsCheck::new(vec![PortSpec::new(
        port,
        Protocol::Tcp,
        "listener",
        NodeRole::All,
    )]);

    let cancel = CancellationToken::new();
    let result = run_with_timeout(&check, &cancel, "127.0.0.1", Duration::from_secs(10)).await;

    assert_eq!(result.status, CheckStatus::Pass);
    assert!(result.error.is_none());
    assert!(!result.details.contains_key("failed_ports"));
}

#[tokio::test]
async fn test_udp_refused_port_closed_with_error() {
    // Nothing bound on this port; ICMP unreachable should surface on read
    let probe = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let free_port = probe.local_addr().unwrap().port();
    drop(probe);

    let check = PortsCheck::new(vec![PortSpec::new(
        free_port,
        Protocol::Udp,
        "nothing",
        NodeRole::All,
    )]);

    let cancel = CancellationToken::new();
    let result = run_with_timeout(&check, &cancel, "127.0.0.1", Duration::from_secs(10)).await;

    assert_eq!(result.status, CheckStatus::Fail);
    let probe = &result.details["ports"].as_array().unwrap()[0];
    assert!(!probe["open"].as_bool().unwrap());
    assert!(!probe["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrapper_records_duration() {
    let check = PortsCheck::new(vec![]);
    let cancel = CancellationToken::new();
    let result = run_with_timeout(&check, &cancel, "127.0.0.1", Duration::from_secs(10)).await;

    assert!(result.duration_ms >= 0.0);
    assert!(result.end_time >= result.start_time);
}
