//! Manifest deploy lifecycle
//!
//! Applies the embedded manifests with server-side apply so install is
//! idempotent, and deletes them in reverse order on uninstall.

use crate::error::{NetProbeError, Result};
use crate::manifests;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::{Api, Client};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn substitute(yaml: &str, namespace: &str, image_override: Option<&str>) -> String {
    let mut yaml = yaml.replace("NAMESPACE_PLACEHOLDER", namespace);
    if let Some(image) = image_override {
        yaml = yaml.replace(manifests::DEFAULT_IMAGE, image);
    }
    yaml
}

/// All manifests as one YAML stream with substitutions applied, for
/// `deploy template`.
pub fn all_manifests(namespace: &str, image_override: Option<&str>) -> String {
    [
        manifests::NAMESPACE_YAML,
        manifests::RBAC_YAML,
        manifests::CONFIGMAP_YAML,
        manifests::DAEMONSET_HOST_YAML,
        manifests::DAEMONSET_OVERLAY_YAML,
    ]
    .iter()
    .map(|m| substitute(m, namespace, image_override))
    .collect::<Vec<_>>()
    .join("---\n")
}

/// Apply namespace, RBAC, ConfigMap, and both DaemonSets
pub async fn install(client: &Client, namespace: &str, image_override: Option<&str>) -> Result<()> {
    for manifest in [
        manifests::NAMESPACE_YAML,
        manifests::RBAC_YAML,
        manifests::CONFIGMAP_YAML,
        manifests::DAEMONSET_HOST_YAML,
        manifests::DAEMONSET_OVERLAY_YAML,
    ] {
        apply_yaml(client, &substitute(manifest, namespace, image_override)).await?;
    }
    Ok(())
}

/// Delete everything `install` created, most-dependent first. Missing
/// resources are not an error.
pub async fn uninstall(client: &Client, namespace: &str) -> Result<()> {
    for manifest in [
        manifests::DAEMONSET_OVERLAY_YAML,
        manifests::DAEMONSET_HOST_YAML,
        manifests::CONFIGMAP_YAML,
        manifests::RBAC_YAML,
        manifests::NAMESPACE_YAML,
    ] {
        delete_yaml(client, &substitute(manifest, namespace, None)).await?;
    }
    Ok(())
}

async fn apply_yaml(client: &Client, yaml: &str) -> Result<()> {
    for doc in serde_yaml::Deserializer::from_str(yaml) {
        let value: Value = serde::Deserialize::deserialize(doc)
            .map_err(|e| NetProbeError::Serialization(format!("Failed to parse YAML: {e}")))?;
        if value.is_null() {
            continue;
        }
        apply_resource(client, &value).await?;
    }
    Ok(())
}

async fn delete_yaml(client: &Client, yaml: &str) -> Result<()> {
    for doc in serde_yaml::Deserializer::from_str(yaml) {
        let value: Value = serde::Deserialize::deserialize(doc)
            .map_err(|e| NetProbeError::Serialization(format!("Failed to parse YAML: {e}")))?;
        if value.is_null() {
            continue;
        }
        delete_resource(client, &value).await?;
    }
    Ok(())
}

fn resource_coords(value: &Value) -> Result<(String, String, String, String)> {
    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| NetProbeError::Config("manifest missing 'kind'".to_string()))?;
    let api_version = value
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| NetProbeError::Config("manifest missing 'apiVersion'".to_string()))?;
    let metadata = value
        .get("metadata")
        .ok_or_else(|| NetProbeError::Config("manifest missing 'metadata'".to_string()))?;
    let name = metadata
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| NetProbeError::Config("manifest missing 'metadata.name'".to_string()))?;
    let namespace = metadata
        .get("namespace")
        .and_then(Value::as_str)
        .unwrap_or("default");

    Ok((
        kind.to_string(),
        api_version.to_string(),
        name.to_string(),
        namespace.to_string(),
    ))
}

async fn apply_resource(client: &Client, value: &Value) -> Result<()> {
    let (kind, api_version, name, namespace) = resource_coords(value)?;
    let pp = PatchParams::apply("netprobe").force();

    match (api_version.as_str(), kind.as_str()) {
        ("v1", "Namespace") => {
            let api: Api<Namespace> = Api::all(client.clone());
            api.patch(&name, &pp, &Patch::Apply(value)).await?;
        }
        ("v1", "ServiceAccount") => {
            let api: Api<ServiceAccount> = Api::namespaced(client.clone(), &namespace);
            api.patch(&name, &pp, &Patch::Apply(value)).await?;
        }
        ("v1", "ConfigMap") => {
            let api: Api<ConfigMap> = Api::namespaced(client.clone(), &namespace);
            api.patch(&name, &pp, &Patch::Apply(value)).await?;
        }
        ("rbac.authorization.k8s.io/v1", "ClusterRole") => {
            let api: Api<ClusterRole> = Api::all(client.clone());
            api.patch(&name, &pp, &Patch::Apply(value)).await?;
        }
        ("rbac.authorization.k8s.io/v1", "ClusterRoleBinding") => {
            let api: Api<ClusterRoleBinding> = Api::all(client.clone());
            api.patch(&name, &pp, &Patch::Apply(value)).await?;
        }
        ("apps/v1", "DaemonSet") => {
            let api: Api<DaemonSet> = Api::namespaced(client.clone(), &namespace);
            api.patch(&name, &pp, &Patch::Apply(value)).await?;
        }
        _ => {
            return Err(NetProbeError::Config(format!(
                "unsupported manifest type: {api_version}/{kind}"
            )));
        }
    }

    Ok(())
}

async fn delete_resource(client: &Client, value: &Value) -> Result<()> {
    let (kind, api_version, name, namespace) = resource_coords(value)?;
    let dp = DeleteParams::default();

    let deleted = match (api_version.as_str(), kind.as_str()) {
        ("v1", "Namespace") => {
            let api: Api<Namespace> = Api::all(client.clone());
            api.delete(&name, &dp).await.map(|_| ())
        }
        ("v1", "ServiceAccount") => {
            let api: Api<ServiceAccount> = Api::namespaced(client.clone(), &namespace);
            api.delete(&name, &dp).await.map(|_| ())
        }
        ("v1", "ConfigMap") => {
            let api: Api<ConfigMap> = Api::namespaced(client.clone(), &namespace);
            api.delete(&name, &dp).await.map(|_| ())
        }
        ("rbac.authorization.k8s.io/v1", "ClusterRole") => {
            let api: Api<ClusterRole> = Api::all(client.clone());
            api.delete(&name, &dp).await.map(|_| ())
        }
        ("rbac.authorization.k8s.io/v1", "ClusterRoleBinding") => {
            let api: Api<ClusterRoleBinding> = Api::all(client.clone());
            api.delete(&name, &dp).await.map(|_| ())
        }
        ("apps/v1", "DaemonSet") => {
            let api: Api<DaemonSet> = Api::namespaced(client.clone(), &namespace);
            api.delete(&name, &dp).await.map(|_| ())
        }
        _ => Ok(()),
    };

    match deleted {
        Ok(()) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Poll a DaemonSet until every scheduled pod is ready
pub async fn wait_for_daemonset_ready(
    client: &Client,
    cancel: &CancellationToken,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    let api: Api<DaemonSet> = Api::namespaced(client.clone(), namespace);
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        let ds = api.get(name).await?;
        if let Some(status) = &ds.status {
            if status.number_ready == status.desired_number_scheduled && status.number_ready > 0 {
                return Ok(());
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(NetProbeError::Cancelled),
            _ = tokio::time::sleep(Duration::from_secs(2)) => {}
        }
    }

    Err(NetProbeError::DaemonSetNotReady(
        name.to_string(),
        "timeout waiting for pods".to_string(),
    ))
}
