//! Run coordination
//!
//! Publishes a run configuration to the shared ConfigMap, arms a log-tail
//! stream per expected agent, then drives two phases: wait for every agent's
//! ready event, then for every agent's completion. Accumulated events are
//! returned even on timeout or cancellation.

pub mod aggregator;
pub mod logwatch;

pub use aggregator::Aggregator;
pub use logwatch::LogWatcher;

use crate::error::{NetProbeError, Result};
use crate::types::{Event, RunConfig, TargetNode};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::PostParams;
use kube::{Api, Client};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Deadline for all agents to acknowledge a new run
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Heartbeat re-checking the aggregator gates
const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// What a run produced. `events` holds everything collected, including on
/// failure exits; coordinators never discard accumulated events.
pub struct RunOutcome {
    pub events: Vec<Event>,
    pub error: Option<NetProbeError>,
}

pub struct Coordinator {
    client: Client,
    namespace: String,
    config_map: String,
}

impl Coordinator {
    pub fn new(client: Client, namespace: &str, config_map: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            config_map: config_map.to_string(),
        }
    }

    /// Rewrite config.json in the shared ConfigMap
    pub async fn update_config(&self, config: &RunConfig) -> Result<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);

        let mut cm = api.get(&self.config_map).await?;
        cm.data
            .get_or_insert_with(Default::default)
            .insert("config.json".to_string(), serde_json::to_string(config)?);
        cm.metadata.managed_fields = None;

        api.replace(&self.config_map, &PostParams::default(), &cm)
            .await?;
        Ok(())
    }

    /// Dispatch one run and collect its event log.
    ///
    /// Returns `Err` only for pre-run failures (config publish); anything
    /// after that point comes back as a `RunOutcome` so partial logs survive.
    /// `timeout` of zero means no overall deadline.
    pub async fn run_tests(
        &self,
        cancel: &CancellationToken,
        config: &RunConfig,
        pod_names: &[String],
        timeout: Duration,
    ) -> Result<RunOutcome> {
        self.update_config(config).await?;

        let (mut watcher, mut event_rx, mut error_rx) =
            LogWatcher::new(self.client.clone(), &self.namespace);
        let agg = Aggregator::new(pod_names);

        let stream_cancel = cancel.child_token();
        for pod_name in pod_names {
            watcher.watch_pod(stream_cancel.clone(), pod_name.clone());
        }

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Readiness phase
        let ready_deadline = tokio::time::sleep(READY_TIMEOUT);
        tokio::pin!(ready_deadline);

        let ready_error = loop {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(event) if event.run_id == config.run_id => {
                        agg.add_event(event);
                        if agg.all_ready() {
                            break None;
                        }
                    }
                    Some(_) => {} // stale run
                    None => break Some(NetProbeError::Cancelled),
                },
                Some(e) = error_rx.recv() => {
                    warn!("log watcher error: {e}");
                }
                _ = &mut ready_deadline => {
                    break Some(NetProbeError::ReadyTimeout {
                        ready: agg.ready_count(),
                        expected: agg.expected_count(),
                    });
                }
                _ = cancel.cancelled() => break Some(NetProbeError::Cancelled),
                _ = ticker.tick() => {
                    if agg.all_ready() {
                        break None;
                    }
                }
            }
        };

        if let Some(error) = ready_error {
            stream_cancel.cancel();
            watcher.close().await;
            return Ok(RunOutcome {
                events: agg.events(),
                error: Some(error),
            });
        }

        // Completion phase
        let run_deadline = async {
            if timeout.is_zero() {
                futures::future::pending::<()>().await;
            } else {
                tokio::time::sleep(timeout).await;
            }
        };
        tokio::pin!(run_deadline);

        let run_error = loop {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(event) if event.run_id == config.run_id => {
                        agg.add_event(event);
                        if agg.all_complete() {
                            break None;
                        }
                    }
                    Some(_) => {}
                    None => break Some(NetProbeError::Cancelled),
                },
                Some(e) = error_rx.recv() => {
                    warn!("log watcher error: {e}");
                }
                _ = &mut run_deadline => {
                    break Some(NetProbeError::RunTimeout {
                        complete: agg.complete_count(),
                        expected: agg.expected_count(),
                    });
                }
                _ = cancel.cancelled() => break Some(NetProbeError::Cancelled),
                _ = ticker.tick() => {
                    if agg.all_complete() {
                        break None;
                    }
                }
            }
        };

        stream_cancel.cancel();
        watcher.close().await;

        Ok(RunOutcome {
            events: agg.events(),
            error: run_error,
        })
    }
}

/// Fresh opaque run identifier
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Enumerate the unordered bandwidth pairs for a set of targets.
///
/// Targets are sorted by node name first, so the N·(N−1)/2 pairs come out in
/// lexicographic order of their first element.
pub fn generate_bandwidth_pairs(targets: &[TargetNode]) -> Vec<(TargetNode, TargetNode)> {
    let mut sorted: Vec<TargetNode> = targets.to_vec();
    sorted.sort_by(|a, b| a.node_name.cmp(&b.node_name));

    let mut pairs = Vec::new();
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            pairs.push((sorted[i].clone(), sorted[j].clone()));
        }
    }
    pairs
}
