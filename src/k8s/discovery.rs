//! Agent pod discovery

use crate::error::Result;
use crate::types::TargetNode;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};

/// List the running, ready agent pods of one DaemonSet as targets carrying
/// their overlay addresses.
pub async fn discover_daemonset_pods(
    client: &Client,
    namespace: &str,
    daemonset_name: &str,
) -> Result<Vec<TargetNode>> {
    let mode = network_mode_from_daemonset(daemonset_name);
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let lp = ListParams::default().labels(&format!("app=netprobe,network-mode={mode}"));

    let pods = api.list(&lp).await?;

    let mut targets = Vec::new();
    for pod in pods.items {
        let Some(status) = &pod.status else { continue };

        if status.phase.as_deref() != Some("Running") {
            continue;
        }

        let ready = status
            .conditions
            .as_ref()
            .map(|conds| {
                conds
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
            .unwrap_or(false);
        if !ready {
            continue;
        }

        targets.push(TargetNode {
            node_name: pod
                .spec
                .as_ref()
                .and_then(|s| s.node_name.clone())
                .unwrap_or_default(),
            pod_name: pod.metadata.name.clone().unwrap_or_default(),
            ip: status.pod_ip.clone().unwrap_or_default(),
            is_controlplane: false,
        });
    }

    Ok(targets)
}

/// Swap each discovered pod's overlay address for its node's routable
/// address, preserving the rest of the target.
pub async fn host_targets_for_pods(
    client: &Client,
    namespace: &str,
    pods: &[TargetNode],
) -> Result<Vec<TargetNode>> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);

    let mut targets = Vec::new();
    for pod in pods {
        let pod_obj = api.get(&pod.pod_name).await?;
        let host_ip = pod_obj
            .status
            .as_ref()
            .and_then(|s| s.host_ip.clone())
            .unwrap_or_default();

        targets.push(TargetNode {
            node_name: pod.node_name.clone(),
            pod_name: pod.pod_name.clone(),
            ip: host_ip,
            is_controlplane: pod.is_controlplane,
        });
    }

    Ok(targets)
}

fn network_mode_from_daemonset(daemonset_name: &str) -> &'static str {
    if daemonset_name == "netprobe-host" {
        "host"
    } else {
        "overlay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_mode_from_daemonset() {
        assert_eq!(network_mode_from_daemonset("netprobe-host"), "host");
        assert_eq!(network_mode_from_daemonset("netprobe-overlay"), "overlay");
        assert_eq!(network_mode_from_daemonset("anything-else"), "overlay");
    }
}
