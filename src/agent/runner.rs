//! Per-run check execution
//!
//! Fans out one task per requested check; each task walks its filtered target
//! list sequentially. Bandwidth runs after the parallel phase, and only on
//! the agent named as the pair's source.

use crate::agent::{events, AgentInfo};
use crate::checks::{
    run_with_timeout, BandwidthCheck, Check, ConntrackCheck, DnsCheck, HostConfigCheck,
    IptablesCheck, PingCheck, PortsCheck,
};
use crate::error::Result;
use crate::types::{filter_ports_for_role, RunConfig, TargetNode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Minimum per-check budget, regardless of the run configuration
const MIN_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Echo count used for agent-driven reachability checks
const AGENT_PING_COUNT: u32 = 5;

pub async fn run_tests(
    cancel: &CancellationToken,
    config: &RunConfig,
    info: &AgentInfo,
) -> Result<()> {
    if let Err(e) = events::emit_ready(info, &config.run_id) {
        warn!("failed to emit ready event: {e}");
    }

    let targets = config.targets_excluding(&info.node_name);
    let timeout = check_timeout(config);

    let mut tasks = JoinSet::new();
    for check_name in &config.checks {
        if check_name == "bandwidth" {
            continue;
        }

        let check_name = check_name.clone();
        let targets = targets.clone();
        let config = config.clone();
        let info = info.clone();
        let cancel = cancel.child_token();

        tasks.spawn(async move {
            run_check(&cancel, &check_name, &targets, &config, &info, timeout).await;
        });
    }
    while tasks.join_next().await.is_some() {}

    if let Some(pair) = &config.bandwidth_test {
        if pair.active && pair.source_pod == info.pod_name {
            run_bandwidth(cancel, config, info).await;
        }
    }

    let summary = json!({
        "checks_completed": config.checks.len(),
        "targets_tested": targets.len(),
    });
    if let Err(e) = events::emit_complete(info, &config.run_id, summary) {
        warn!("failed to emit complete event: {e}");
    }

    Ok(())
}

/// Effective per-check budget: the run's timeout_seconds with a 5 s floor
fn check_timeout(config: &RunConfig) -> Duration {
    MIN_CHECK_TIMEOUT.max(Duration::from_secs(config.timeout_seconds))
}

async fn run_check(
    cancel: &CancellationToken,
    check_name: &str,
    targets: &[TargetNode],
    config: &RunConfig,
    info: &AgentInfo,
    timeout: Duration,
) {
    // Local checks ignore the target list and run exactly once
    if matches!(check_name, "hostconfig" | "conntrack" | "iptables") {
        let check: Arc<dyn Check> = match check_name {
            "hostconfig" => Arc::new(HostConfigCheck),
            "conntrack" => Arc::new(ConntrackCheck),
            _ => Arc::new(IptablesCheck),
        };
        run_single(cancel, check.as_ref(), "localhost", "localhost", config, info, timeout).await;
        return;
    }

    for target in targets {
        let check: Arc<dyn Check> = match check_name {
            "dns" => Arc::new(DnsCheck::new(
                config.dns_names.clone(),
                config.dns_servers.first().cloned(),
            )),
            "ping" => Arc::new(PingCheck::new(AGENT_PING_COUNT)),
            "ports" => {
                let catalog = if config.ports.is_empty() {
                    crate::types::default_ports()
                } else {
                    config.ports.clone()
                };
                Arc::new(PortsCheck::new(filter_ports_for_role(
                    &catalog,
                    target.is_controlplane,
                )))
            }
            other => {
                warn!("unknown check type: {other}");
                return;
            }
        };

        // DNS answers are independent of the target address
        let target_ip = if check_name == "dns" {
            "dns-test"
        } else {
            target.ip.as_str()
        };

        run_single(cancel, check.as_ref(), target_ip, &target.node_name, config, info, timeout)
            .await;
    }
}

async fn run_single(
    cancel: &CancellationToken,
    check: &dyn Check,
    target_ip: &str,
    target_label: &str,
    config: &RunConfig,
    info: &AgentInfo,
    timeout: Duration,
) {
    if let Err(e) = events::emit_test_start(info, check.name(), target_label, &config.run_id) {
        warn!("failed to emit test start: {e}");
    }

    let mut result = run_with_timeout(check, cancel, target_ip, timeout).await;
    result.node = info.node_name.clone();
    if !check.is_local() {
        result.target = target_label.to_string();
    }

    if let Err(e) = events::emit_test_result(info, &result, &config.run_id) {
        warn!("failed to emit test result: {e}");
    }
}

async fn run_bandwidth(cancel: &CancellationToken, config: &RunConfig, info: &AgentInfo) {
    let Some(pair) = &config.bandwidth_test else {
        return;
    };

    if let Err(e) = events::emit_test_start(info, "bandwidth", &pair.target_node, &config.run_id) {
        warn!("failed to emit test start: {e}");
    }

    let check = BandwidthCheck::default();
    let timeout = check.timeout();
    let mut result = run_with_timeout(&check, cancel, &pair.target_ip, timeout).await;
    result.node = info.node_name.clone();
    result.target = pair.target_node.clone();

    if let Err(e) = events::emit_test_result(info, &result, &config.run_id) {
        warn!("failed to emit test result: {e}");
    }
}
