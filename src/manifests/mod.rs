//! Embedded deployment manifests
//!
//! Shipped inside the binary so `deploy install` works without any files on
//! disk. Namespace and image substitution happens at apply time.

pub const NAMESPACE_YAML: &str = include_str!("namespace.yaml");
pub const RBAC_YAML: &str = include_str!("rbac.yaml");
pub const CONFIGMAP_YAML: &str = include_str!("configmap.yaml");
pub const DAEMONSET_HOST_YAML: &str = include_str!("daemonset-host.yaml");
pub const DAEMONSET_OVERLAY_YAML: &str = include_str!("daemonset-overlay.yaml");

/// Image used when no override is given
pub const DEFAULT_IMAGE: &str = "ghcr.io/netprobe/netprobe:latest";
