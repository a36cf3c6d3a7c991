//! Integration tests for the deploy lifecycle
//!
//! These tests require a real Kubernetes cluster.

use netprobe::client::create_client;
use netprobe::k8s;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TEST_NAMESPACE: &str = "netprobe-test";

/// Install then uninstall the full manifest set
#[tokio::test]
#[ignore]
async fn test_install_uninstall_round_trip() {
    let client = create_client(None).await.expect("should create client");

    k8s::install(&client, TEST_NAMESPACE, None)
        .await
        .expect("install should succeed");

    // Install is idempotent
    k8s::install(&client, TEST_NAMESPACE, None)
        .await
        .expect("second install should succeed");

    k8s::uninstall(&client, TEST_NAMESPACE)
        .await
        .expect("uninstall should succeed");

    // Uninstall tolerates missing resources
    k8s::uninstall(&client, TEST_NAMESPACE)
        .await
        .expect("second uninstall should succeed");
}

/// Wait for the host DaemonSet after an install
#[tokio::test]
#[ignore]
async fn test_daemonset_becomes_ready() {
    let client = create_client(None).await.expect("should create client");
    let cancel = CancellationToken::new();

    k8s::install(&client, TEST_NAMESPACE, None)
        .await
        .expect("install should succeed");

    k8s::wait_for_daemonset_ready(
        &client,
        &cancel,
        TEST_NAMESPACE,
        "netprobe-host",
        Duration::from_secs(120),
    )
    .await
    .expect("host DaemonSet should become ready");

    let pods = k8s::discover_daemonset_pods(&client, TEST_NAMESPACE, "netprobe-host")
        .await
        .expect("discovery should succeed");
    assert!(!pods.is_empty(), "should discover at least one agent pod");

    for pod in &pods {
        assert!(!pod.node_name.is_empty());
        assert!(!pod.pod_name.is_empty());
        assert!(!pod.ip.is_empty());
    }
}
