//! Run configuration shared between the controller and the agents
//!
//! The controller serializes one `RunConfig` per run into the shared
//! ConfigMap; agents watch it and react to fresh run identifiers.

use crate::types::ports::PortSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One node/agent pair as seen from the controller.
///
/// `ip` is the node's routable address when testing the host network path and
/// the pod's overlay address when testing the overlay path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNode {
    pub node_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_name: String,
    pub ip: String,
    #[serde(default)]
    pub is_controlplane: bool,
}

/// Descriptor for one source→target bandwidth measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthPair {
    pub active: bool,
    pub source_node: String,
    pub source_pod: String,
    pub target_node: String,
    pub target_ip: String,
}

/// The config document written to the shared ConfigMap before each run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub run_id: String,
    pub triggered_at: DateTime<Utc>,
    pub targets: Vec<TargetNode>,
    pub checks: Vec<String>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub dns_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_test: Option<BandwidthPair>,
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub debug: bool,
}

impl RunConfig {
    /// Targets excluding the agent's own node
    pub fn targets_excluding(&self, node_name: &str) -> Vec<TargetNode> {
        self.targets
            .iter()
            .filter(|t| t.node_name != node_name)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(node: &str) -> TargetNode {
        TargetNode {
            node_name: node.to_string(),
            pod_name: format!("netprobe-{node}"),
            ip: "10.0.0.1".to_string(),
            is_controlplane: false,
        }
    }

    #[test]
    fn test_targets_excluding_self() {
        let config = RunConfig {
            run_id: "r1".to_string(),
            triggered_at: Utc::now(),
            targets: vec![target("a"), target("b"), target("c")],
            checks: vec!["ping".to_string()],
            ports: Vec::new(),
            dns_servers: Vec::new(),
            dns_names: Vec::new(),
            bandwidth_test: None,
            timeout_seconds: 5,
            debug: false,
        };

        let filtered = config.targets_excluding("b");
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|t| t.node_name != "b"));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = RunConfig {
            run_id: "abc-123".to_string(),
            triggered_at: Utc::now(),
            targets: vec![target("a")],
            checks: vec!["dns".to_string(), "ping".to_string()],
            ports: crate::types::ports::default_ports(),
            dns_servers: Vec::new(),
            dns_names: vec!["example.com".to_string()],
            bandwidth_test: Some(BandwidthPair {
                active: true,
                source_node: "a".to_string(),
                source_pod: "netprobe-a".to_string(),
                target_node: "b".to_string(),
                target_ip: "10.0.0.2".to_string(),
            }),
            timeout_seconds: 5,
            debug: true,
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "abc-123");
        assert_eq!(parsed.checks.len(), 2);
        assert!(parsed.bandwidth_test.is_some());
    }

    #[test]
    fn test_config_field_names_stable() {
        let config = RunConfig {
            run_id: "r".to_string(),
            triggered_at: Utc::now(),
            targets: vec![target("a")],
            checks: Vec::new(),
            ports: Vec::new(),
            dns_servers: Vec::new(),
            dns_names: Vec::new(),
            bandwidth_test: None,
            timeout_seconds: 5,
            debug: false,
        };

        let value: serde_json::Value = serde_json::to_value(&config).unwrap();
        assert!(value.get("run_id").is_some());
        assert!(value.get("triggered_at").is_some());
        assert!(value.get("timeout_seconds").is_some());
        assert!(value.get("debug").is_none()); // omitted when false
        let target = &value["targets"][0];
        assert!(target.get("node_name").is_some());
        assert!(target.get("is_controlplane").is_some());
    }
}
