//! Integration tests for the shared config document
//!
//! These tests require a real Kubernetes cluster with the netprobe
//! resources already installed (see deploy_test).

use chrono::Utc;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
use netprobe::client::create_client;
use netprobe::coordinator::{generate_run_id, Coordinator};
use netprobe::types::RunConfig;

const TEST_NAMESPACE: &str = "netprobe-test";
const CONFIG_MAP: &str = "netprobe-config";

fn empty_config(run_id: String) -> RunConfig {
    RunConfig {
        run_id,
        triggered_at: Utc::now(),
        targets: Vec::new(),
        checks: vec!["dns".to_string()],
        ports: Vec::new(),
        dns_servers: Vec::new(),
        dns_names: Vec::new(),
        bandwidth_test: None,
        timeout_seconds: 5,
        debug: false,
    }
}

/// Publishing a config rewrites config.json in place
#[tokio::test]
#[ignore]
async fn test_update_config_round_trip() {
    let client = create_client(None).await.expect("should create client");
    let coordinator = Coordinator::new(client.clone(), TEST_NAMESPACE, CONFIG_MAP);

    let run_id = generate_run_id();
    coordinator
        .update_config(&empty_config(run_id.clone()))
        .await
        .expect("update should succeed");

    let api: Api<ConfigMap> = Api::namespaced(client, TEST_NAMESPACE);
    let cm = api.get(CONFIG_MAP).await.expect("configmap should exist");
    let raw = cm
        .data
        .as_ref()
        .and_then(|d| d.get("config.json"))
        .expect("config.json should be present");

    let parsed: RunConfig = serde_json::from_str(raw).expect("config should parse");
    assert_eq!(parsed.run_id, run_id);
}

/// Two publishes leave only the latest run id visible
#[tokio::test]
#[ignore]
async fn test_second_publish_overwrites() {
    let client = create_client(None).await.expect("should create client");
    let coordinator = Coordinator::new(client.clone(), TEST_NAMESPACE, CONFIG_MAP);

    let first = generate_run_id();
    let second = generate_run_id();
    coordinator
        .update_config(&empty_config(first))
        .await
        .expect("first update");
    coordinator
        .update_config(&empty_config(second.clone()))
        .await
        .expect("second update");

    let api: Api<ConfigMap> = Api::namespaced(client, TEST_NAMESPACE);
    let cm = api.get(CONFIG_MAP).await.expect("configmap should exist");
    let raw = cm.data.as_ref().and_then(|d| d.get("config.json")).unwrap();
    let parsed: RunConfig = serde_json::from_str(raw).unwrap();
    assert_eq!(parsed.run_id, second);
}
