//! Node role detection

use crate::error::Result;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Standard control plane label (k8s 1.24+)
pub const LABEL_CONTROL_PLANE: &str = "node-role.kubernetes.io/control-plane";

/// Legacy master label, deprecated but still common
pub const LABEL_MASTER: &str = "node-role.kubernetes.io/master";

/// Map of node name to control plane status for the whole cluster
pub async fn node_roles(client: &Client) -> Result<HashMap<String, bool>> {
    let api: Api<Node> = Api::all(client.clone());
    let nodes = api.list(&ListParams::default()).await?;

    let mut roles = HashMap::new();
    for node in nodes.items {
        let name = node.metadata.name.clone().unwrap_or_default();
        let is_cp = is_control_plane_from_labels(node.metadata.labels.as_ref());
        roles.insert(name, is_cp);
    }

    Ok(roles)
}

/// Presence of either control plane label is what counts, not its value
pub fn is_control_plane_from_labels(labels: Option<&BTreeMap<String, String>>) -> bool {
    labels
        .map(|l| l.contains_key(LABEL_CONTROL_PLANE) || l.contains_key(LABEL_MASTER))
        .unwrap_or(false)
}
