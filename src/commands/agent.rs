//! Agent command: entry point for DaemonSet pods

use crate::agent;
use crate::cli::AgentArgs;
use crate::error::{NetProbeError, Result};
use tokio_util::sync::CancellationToken;

pub async fn run_agent(args: &AgentArgs) -> Result<()> {
    if args.mode != "configmap" {
        return Err(NetProbeError::InvalidArgument(format!(
            "unsupported agent mode: {}",
            args.mode
        )));
    }

    let config_ref = args.config.as_deref().ok_or_else(|| {
        NetProbeError::InvalidArgument(
            "--config required for configmap mode (format: NAMESPACE/CONFIGMAPNAME)".to_string(),
        )
    })?;

    let cancel = CancellationToken::new();

    // SIGTERM from the kubelet should wind the agent down cleanly
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(_) => return,
            };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        shutdown.cancel();
    });

    agent::run(cancel, config_ref).await
}
