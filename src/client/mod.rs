//! Kubernetes client abstraction
//!
//! The controller runs from a developer machine (kubeconfig) while agents run
//! in-cluster; `kube::Client::try_default` handles both by preferring the
//! in-cluster environment when present.

use crate::error::{NetProbeError, Result};
use kube::{config::KubeConfigOptions, Client, Config};

/// Create a Kubernetes client for the specified context
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = load_config(context).await?;
    Client::try_from(config).map_err(NetProbeError::from)
}

/// Create a client from the in-cluster service account (agent side)
pub async fn create_incluster_client() -> Result<Client> {
    let config = Config::incluster()
        .map_err(|e| NetProbeError::Config(format!("Failed to load in-cluster config: {e}")))?;
    Client::try_from(config).map_err(NetProbeError::from)
}

/// Load Kubernetes configuration, falling back from in-cluster to kubeconfig
async fn load_config(context: Option<&str>) -> Result<Config> {
    if let Ok(config) = Config::incluster() {
        return Ok(config);
    }

    let options = KubeConfigOptions {
        context: context.map(String::from),
        ..Default::default()
    };

    Config::from_kubeconfig(&options)
        .await
        .map_err(|e| NetProbeError::Config(format!("Failed to load kubeconfig: {e}")))
}
