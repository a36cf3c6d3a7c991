//! The per-node agent
//!
//! Runs inside each DaemonSet pod, watches the shared ConfigMap for new run
//! identifiers, executes the selected checks, and emits JSON events on
//! stdout. Logging goes to stderr so stdout stays a clean event stream.

pub mod events;
pub mod iperf;
pub mod runner;
pub mod watch;

use crate::error::{NetProbeError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Identity of this agent, taken from the downward API environment
#[derive(Debug, Clone)]
pub struct AgentInfo {
    pub node_name: String,
    pub pod_name: String,
    pub pod_ip: String,
    pub host_ip: String,
}

impl AgentInfo {
    /// Read identity from NODE_NAME / POD_NAME / POD_IP / HOST_IP. All four
    /// are required; a partial identity would corrupt the event stream.
    pub fn from_env() -> Result<Self> {
        fn required(name: &'static str) -> Result<String> {
            match std::env::var(name) {
                Ok(v) if !v.is_empty() => Ok(v),
                _ => Err(NetProbeError::MissingEnv(name)),
            }
        }

        Ok(Self {
            node_name: required("NODE_NAME")?,
            pod_name: required("POD_NAME")?,
            pod_ip: required("POD_IP")?,
            host_ip: required("HOST_IP")?,
        })
    }
}

/// Agent entry point: start the throughput server supervisor and enter
/// ConfigMap watch mode.
pub async fn run(cancel: CancellationToken, config_ref: &str) -> Result<()> {
    let info = AgentInfo::from_env()?;
    info!(
        node = %info.node_name,
        pod = %info.pod_name,
        pod_ip = %info.pod_ip,
        host_ip = %info.host_ip,
        "starting agent"
    );

    if let Err(e) = iperf::start_server(cancel.child_token()).await {
        warn!("failed to start iperf3 server: {e}");
        warn!("bandwidth tests will fail on this node");
    } else {
        info!("iperf3 server started");
    }

    let (namespace, name) = parse_config_ref(config_ref)?;
    info!("watching ConfigMap {namespace}/{name}");

    watch::watch_config(cancel, &namespace, &name, info).await
}

/// Split a `NAMESPACE/CONFIGMAPNAME` reference
pub fn parse_config_ref(config_ref: &str) -> Result<(String, String)> {
    match config_ref.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() => {
            Ok((ns.to_string(), name.to_string()))
        }
        _ => Err(NetProbeError::Config(format!(
            "config must be in format NAMESPACE/CONFIGMAPNAME, got: {config_ref}"
        ))),
    }
}
