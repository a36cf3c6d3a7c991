//! Port catalog: which ports to probe, on which class of node

use crate::error::{NetProbeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which type of nodes a port should be checked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Checked on every node
    All,
    /// Checked only on control plane nodes
    #[serde(rename = "controlplane")]
    ControlPlane,
}

/// Transport protocol for a port probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// A port to check connectivity against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub port: u16,
    pub protocol: Protocol,
    pub name: String,
    pub node_role: NodeRole,
}

impl PortSpec {
    pub fn new(port: u16, protocol: Protocol, name: &str, node_role: NodeRole) -> Self {
        Self {
            port,
            protocol,
            name: name.to_string(),
            node_role,
        }
    }
}

/// Default list of ports to check on a cluster node
pub fn default_ports() -> Vec<PortSpec> {
    vec![
        // Ports expected on all nodes
        PortSpec::new(10250, Protocol::Tcp, "kubelet", NodeRole::All),
        // Control plane specific ports
        PortSpec::new(6443, Protocol::Tcp, "kube-apiserver", NodeRole::ControlPlane),
        PortSpec::new(9345, Protocol::Tcp, "rke2-supervisor", NodeRole::ControlPlane),
        // etcd runs on control plane nodes
        PortSpec::new(2379, Protocol::Tcp, "etcd-client", NodeRole::ControlPlane),
        PortSpec::new(2380, Protocol::Tcp, "etcd-peer", NodeRole::ControlPlane),
    ]
}

/// Ports that apply to a target with the given control plane status
pub fn filter_ports_for_role(ports: &[PortSpec], is_control_plane: bool) -> Vec<PortSpec> {
    ports
        .iter()
        .filter(|p| p.node_role == NodeRole::All || is_control_plane)
        .cloned()
        .collect()
}

/// Parse a `PORT/PROTOCOL:NAME` override string, e.g. `8080/tcp:my-service`
pub fn parse_port_spec(s: &str) -> Result<PortSpec> {
    let invalid = || NetProbeError::InvalidPortSpec(s.to_string());

    let (port_proto, name) = s.split_once(':').ok_or_else(invalid)?;
    let (port, proto) = port_proto.split_once('/').ok_or_else(invalid)?;

    let port: u16 = port.parse().map_err(|_| invalid())?;
    let protocol = match proto.to_ascii_lowercase().as_str() {
        "tcp" => Protocol::Tcp,
        "udp" => Protocol::Udp,
        _ => return Err(invalid()),
    };

    if name.is_empty() {
        return Err(invalid());
    }

    Ok(PortSpec::new(port, protocol, name, NodeRole::All))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports_roles() {
        let ports = default_ports();
        assert_eq!(ports.len(), 5);
        assert_eq!(ports[0].name, "kubelet");
        assert_eq!(ports[0].node_role, NodeRole::All);
        assert!(ports[1..]
            .iter()
            .all(|p| p.node_role == NodeRole::ControlPlane));
    }

    #[test]
    fn test_filter_ports_worker_node() {
        let filtered = filter_ports_for_role(&default_ports(), false);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].port, 10250);
    }

    #[test]
    fn test_filter_ports_control_plane() {
        let filtered = filter_ports_for_role(&default_ports(), true);
        assert_eq!(filtered.len(), 5);
    }

    #[test]
    fn test_parse_port_spec() {
        let spec = parse_port_spec("8080/tcp:my-service").unwrap();
        assert_eq!(spec.port, 8080);
        assert_eq!(spec.protocol, Protocol::Tcp);
        assert_eq!(spec.name, "my-service");
        assert_eq!(spec.node_role, NodeRole::All);
    }

    #[test]
    fn test_parse_port_spec_udp() {
        let spec = parse_port_spec("53/udp:dns").unwrap();
        assert_eq!(spec.protocol, Protocol::Udp);
    }

    #[test]
    fn test_parse_port_spec_invalid() {
        assert!(parse_port_spec("8080:name").is_err());
        assert!(parse_port_spec("8080/sctp:name").is_err());
        assert!(parse_port_spec("notaport/tcp:name").is_err());
        assert!(parse_port_spec("8080/tcp:").is_err());
    }
}
