//! ConfigMap watch loop
//!
//! Watches the shared config document and re-fetches the latest state on
//! every add/modify notification. The watch API can deliver stale or
//! coalesced events, so the fetched document is the source of truth and the
//! run identifier decides whether anything new actually happened.

use crate::agent::{events, runner, AgentInfo};
use crate::client::create_incluster_client;
use crate::error::Result;
use crate::types::RunConfig;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::WatchParams;
use kube::core::WatchEvent;
use kube::Api;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Pause before reconnecting after the watch stream closes
const RECONNECT_PAUSE: Duration = Duration::from_secs(2);

/// Pause before retrying after the watch fails to open
const RETRY_PAUSE: Duration = Duration::from_secs(5);

pub async fn watch_config(
    cancel: CancellationToken,
    namespace: &str,
    name: &str,
    info: AgentInfo,
) -> Result<()> {
    let client = create_incluster_client().await?;
    let api: Api<ConfigMap> = Api::namespaced(client, namespace);

    let mut last_run_id = String::new();

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let wp = WatchParams::default().fields(&format!("metadata.name={name}"));
        let stream = match api.watch(&wp, "0").await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("failed to watch ConfigMap: {e}, retrying in 5s");
                if sleep_unless_cancelled(&cancel, RETRY_PAUSE).await {
                    return Ok(());
                }
                continue;
            }
        };
        let mut stream = stream.boxed();

        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                item = stream.try_next() => item,
            };

            match item {
                Ok(Some(WatchEvent::Added(_)) | Some(WatchEvent::Modified(_))) => {
                    if let Some(config) = fetch_config(&api, name).await {
                        if !config.run_id.is_empty() && config.run_id != last_run_id {
                            info!("new run detected: {}", config.run_id);
                            last_run_id = config.run_id.clone();
                            handle_run(&cancel, &config, &info).await;
                        }
                    }
                }
                // Deletions and bookmarks don't carry a new run
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    warn!("watch stream error: {e}");
                    break;
                }
            }
        }

        info!("watch channel closed, reconnecting in 2s");
        if sleep_unless_cancelled(&cancel, RECONNECT_PAUSE).await {
            return Ok(());
        }
    }
}

/// Fetch the latest config document; the watch event itself may be stale
async fn fetch_config(api: &Api<ConfigMap>, name: &str) -> Option<RunConfig> {
    let cm = match api.get(name).await {
        Ok(cm) => cm,
        Err(e) => {
            warn!("failed to get ConfigMap: {e}");
            return None;
        }
    };

    let Some(config_json) = cm.data.as_ref().and_then(|d| d.get("config.json")) else {
        warn!("ConfigMap does not contain config.json");
        return None;
    };

    match serde_json::from_str(config_json) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("failed to parse config.json: {e}");
            None
        }
    }
}

async fn handle_run(cancel: &CancellationToken, config: &RunConfig, info: &AgentInfo) {
    info!("handling new run: {}", config.run_id);

    if let Err(e) = runner::run_tests(cancel, config, info).await {
        warn!("error running tests: {e}");
        if let Err(emit_err) = events::emit_error(info, &config.run_id, &e.to_string()) {
            warn!("failed to emit error event: {emit_err}");
        }
    }
}

/// Returns true if cancelled during the pause
async fn sleep_unless_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
