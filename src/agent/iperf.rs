//! Throughput server supervisor
//!
//! iperf3 in one-off mode serves a single client and exits; respawning after
//! each exit gives every bandwidth pair a fresh server and avoids the shared
//! "server is busy" state of a long-lived instance.

use crate::error::{NetProbeError, Result};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const RESPAWN_PAUSE: Duration = Duration::from_millis(100);

/// Start the supervisor loop. Fails only when the iperf3 executable is
/// missing; server exits during operation are handled by the loop.
pub async fn start_server(cancel: CancellationToken) -> Result<()> {
    let probe = Command::new("iperf3").arg("--version").output().await;
    if let Err(e) = probe {
        return Err(NetProbeError::Config(format!(
            "iperf3 not found in PATH: {e}"
        )));
    }

    tokio::spawn(run_server_loop(cancel));

    // Give the first server instance time to bind
    tokio::time::sleep(Duration::from_millis(500)).await;

    Ok(())
}

async fn run_server_loop(cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        match Command::new("iperf3").args(["-s", "--one-off"]).spawn() {
            Ok(mut child) => {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = child.kill().await;
                        return;
                    }
                    status = child.wait() => {
                        match status {
                            Ok(status) => debug!("iperf3 server exited: {status}"),
                            Err(e) => warn!("iperf3 server wait failed: {e}"),
                        }
                    }
                }
            }
            Err(e) => warn!("failed to spawn iperf3 server: {e}"),
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RESPAWN_PAUSE) => {}
        }
    }
}
