//! Coordinated run command: the top-level test driver
//!
//! Ensures the agent fleet exists, discovers targets for each requested
//! network mode, dispatches the standard checks one mode at a time, then
//! walks the bandwidth pairs sequentially.

use crate::checks::dns::{filter_cluster_local_names, DEFAULT_DNS_NAMES};
use crate::cli::{OutputFormat, RunArgs};
use crate::client::create_client;
use crate::coordinator::{generate_bandwidth_pairs, generate_run_id, Coordinator};
use crate::error::{NetProbeError, Result};
use crate::k8s;
use crate::output;
use crate::types::{default_ports, parse_port_spec, BandwidthPair, Event, PortSpec, RunConfig, TargetNode};
use chrono::Utc;
use k8s_openapi::api::apps::v1::DaemonSet;
use kube::{Api, Client};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CONFIG_MAP_NAME: &str = "netprobe-config";
const HOST_DAEMONSET: &str = "netprobe-host";
const OVERLAY_DAEMONSET: &str = "netprobe-overlay";

/// Worker-side per-check budget written into the run config
const CHECK_TIMEOUT_SECONDS: u64 = 5;

/// Deadline for a DaemonSet rollout
const DEPLOY_READY_TIMEOUT: Duration = Duration::from_secs(120);

/// Pause between bandwidth pairs so the one-shot server can re-arm
const PAIR_GAP: Duration = Duration::from_secs(2);

pub async fn run_tests(
    context: Option<&str>,
    namespace: &str,
    args: &RunArgs,
    output_format: OutputFormat,
    debug: bool,
) -> Result<()> {
    let host_network = !args.no_host_network;
    let overlay = !args.no_overlay;

    if !host_network && !overlay {
        return Err(NetProbeError::InvalidArgument(
            "at least one network mode must be enabled".to_string(),
        ));
    }

    let bandwidth_requested = args.checks.iter().any(|c| c == "bandwidth");
    let standard_checks: Vec<String> = args
        .checks
        .iter()
        .filter(|c| c.as_str() != "bandwidth")
        .cloned()
        .collect();

    let port_catalog = parse_port_overrides(&args.ports)?;

    println!("Starting network tests...");
    println!("Network modes: host={host_network} overlay={overlay}");
    println!("Checks: {}", args.checks.join(", "));
    println!();

    let client = create_client(context).await?;
    let cancel = CancellationToken::new();

    ensure_deployment(&client, &cancel, namespace, args, host_network, overlay).await?;

    let coordinator = Coordinator::new(client.clone(), namespace, CONFIG_MAP_NAME);

    println!("\nDiscovering agent pods...");
    let roles = k8s::node_roles(&client).await.unwrap_or_default();

    let mut host_pods = Vec::new();
    let mut host_targets = Vec::new();
    if host_network {
        host_pods = k8s::discover_daemonset_pods(&client, namespace, HOST_DAEMONSET).await?;
        apply_node_roles(&mut host_pods, &roles);
        host_targets = k8s::host_targets_for_pods(&client, namespace, &host_pods).await?;
        println!("Found {} host network pods", host_pods.len());
    }

    let mut overlay_targets = Vec::new();
    if overlay {
        overlay_targets =
            k8s::discover_daemonset_pods(&client, namespace, OVERLAY_DAEMONSET).await?;
        apply_node_roles(&mut overlay_targets, &roles);
        println!("Found {} overlay network pods", overlay_targets.len());
    }

    let mut all_events: Vec<Event> = Vec::new();

    if !standard_checks.is_empty() {
        println!("\nRunning standard checks...");

        if host_network {
            println!("\n--- Host Network Tests ---");
            match run_standard_pass(
                &coordinator,
                &cancel,
                &host_targets,
                &host_pods,
                &standard_checks,
                &port_catalog,
                args.timeout,
                debug,
                true,
            )
            .await
            {
                Ok(events) => all_events.extend(events),
                Err(e) => eprintln!("Warning: host network tests failed: {e}"),
            }
        }

        if overlay {
            println!("\n--- Overlay Network Tests ---");
            // Port expectations describe node-level services, not pods
            let overlay_checks: Vec<String> = standard_checks
                .iter()
                .filter(|c| c.as_str() != "ports")
                .cloned()
                .collect();

            match run_standard_pass(
                &coordinator,
                &cancel,
                &overlay_targets,
                &overlay_targets,
                &overlay_checks,
                &port_catalog,
                args.timeout,
                debug,
                false,
            )
            .await
            {
                Ok(events) => all_events.extend(events),
                Err(e) => eprintln!("Warning: overlay network tests failed: {e}"),
            }
        }
    }

    if bandwidth_requested {
        println!("\nRunning bandwidth tests...");

        if host_network {
            println!("\n--- Host Network Bandwidth ---");
            match run_bandwidth_pass(&coordinator, &cancel, &host_targets, args.timeout, debug, "host")
                .await
            {
                Ok(events) => all_events.extend(events),
                Err(e) => eprintln!("Warning: host bandwidth tests failed: {e}"),
            }
        }

        if overlay {
            println!("\n--- Overlay Network Bandwidth ---");
            match run_bandwidth_pass(
                &coordinator,
                &cancel,
                &overlay_targets,
                args.timeout,
                debug,
                "overlay",
            )
            .await
            {
                Ok(events) => all_events.extend(events),
                Err(e) => eprintln!("Warning: overlay bandwidth tests failed: {e}"),
            }
        }
    }

    if args.cleanup {
        println!("\nCleaning up...");
        match k8s::uninstall(&client, namespace).await {
            Ok(()) => println!("Resources removed"),
            Err(e) => eprintln!("Warning: cleanup failed: {e}"),
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("Test Results");
    println!("{}\n", "=".repeat(80));

    output::print_events(&all_events, output_format, debug)?;
    Ok(())
}

fn parse_port_overrides(overrides: &[String]) -> Result<Vec<PortSpec>> {
    if overrides.is_empty() {
        return Ok(default_ports());
    }
    overrides.iter().map(|s| parse_port_spec(s)).collect()
}

fn apply_node_roles(targets: &mut [TargetNode], roles: &std::collections::HashMap<String, bool>) {
    for target in targets {
        target.is_controlplane = roles.get(&target.node_name).copied().unwrap_or(false);
    }
}

async fn ensure_deployment(
    client: &Client,
    cancel: &CancellationToken,
    namespace: &str,
    args: &RunArgs,
    host_network: bool,
    overlay: bool,
) -> Result<()> {
    println!("Checking agent deployment...");
    let ds_api: Api<DaemonSet> = Api::namespaced(client.clone(), namespace);

    if ds_api.get(HOST_DAEMONSET).await.is_err() {
        println!("Deploying DaemonSets...");
        k8s::install(client, namespace, args.image.as_deref()).await?;
        println!("DaemonSets deployed");
    } else {
        println!("DaemonSets already deployed");
    }

    println!("\nWaiting for DaemonSets to be ready...");
    if host_network {
        k8s::wait_for_daemonset_ready(client, cancel, namespace, HOST_DAEMONSET, DEPLOY_READY_TIMEOUT)
            .await?;
        println!("Host network DaemonSet ready");
    }
    if overlay {
        k8s::wait_for_daemonset_ready(
            client,
            cancel,
            namespace,
            OVERLAY_DAEMONSET,
            DEPLOY_READY_TIMEOUT,
        )
        .await?;
        println!("Overlay network DaemonSet ready");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_standard_pass(
    coordinator: &Coordinator,
    cancel: &CancellationToken,
    targets: &[TargetNode],
    pods: &[TargetNode],
    checks: &[String],
    port_catalog: &[PortSpec],
    timeout: Duration,
    debug: bool,
    is_host_network: bool,
) -> Result<Vec<Event>> {
    let run_id = generate_run_id();

    let mut dns_names: Vec<String> = DEFAULT_DNS_NAMES.iter().map(|s| s.to_string()).collect();
    if is_host_network {
        dns_names = filter_cluster_local_names(&dns_names);
    }

    let config = RunConfig {
        run_id: run_id.clone(),
        triggered_at: Utc::now(),
        targets: targets.to_vec(),
        checks: checks.to_vec(),
        ports: port_catalog.to_vec(),
        dns_servers: Vec::new(),
        dns_names,
        bandwidth_test: None,
        timeout_seconds: CHECK_TIMEOUT_SECONDS,
        debug,
    };

    let pod_names: Vec<String> = pods.iter().map(|p| p.pod_name.clone()).collect();
    println!(
        "Starting test run {} with {} pods...",
        &run_id[..8],
        pod_names.len()
    );

    let outcome = coordinator
        .run_tests(cancel, &config, &pod_names, timeout)
        .await?;

    match &outcome.error {
        Some(e) => eprintln!("Warning: run ended early: {e}"),
        None => println!(
            "Test run completed ({} events collected)",
            outcome.events.len()
        ),
    }

    Ok(tag_network(outcome.events, is_host_network))
}

async fn run_bandwidth_pass(
    coordinator: &Coordinator,
    cancel: &CancellationToken,
    targets: &[TargetNode],
    timeout: Duration,
    debug: bool,
    network: &str,
) -> Result<Vec<Event>> {
    let pairs = generate_bandwidth_pairs(targets);
    println!("Running {} bandwidth tests (sequential)...", pairs.len());

    let mut all_events = Vec::new();

    for (idx, (source, target)) in pairs.iter().enumerate() {
        println!(
            "[{}/{}] Testing {} -> {}...",
            idx + 1,
            pairs.len(),
            source.node_name,
            target.node_name
        );

        let run_id = generate_run_id();
        let config = RunConfig {
            run_id,
            triggered_at: Utc::now(),
            targets: vec![target.clone()],
            checks: Vec::new(),
            ports: Vec::new(),
            dns_servers: Vec::new(),
            dns_names: Vec::new(),
            bandwidth_test: Some(BandwidthPair {
                active: true,
                source_node: source.node_name.clone(),
                source_pod: source.pod_name.clone(),
                target_node: target.node_name.clone(),
                target_ip: target.ip.clone(),
            }),
            timeout_seconds: CHECK_TIMEOUT_SECONDS,
            debug,
        };

        let pod_names = vec![source.pod_name.clone()];
        match coordinator
            .run_tests(cancel, &config, &pod_names, timeout)
            .await
        {
            Ok(outcome) => {
                if let Some(e) = &outcome.error {
                    eprintln!("Warning: pair failed: {e}");
                }
                all_events.extend(tag_network_str(outcome.events, network));
            }
            Err(e) => {
                eprintln!("Warning: pair failed: {e}");
                continue;
            }
        }

        if idx + 1 < pairs.len() {
            tokio::time::sleep(PAIR_GAP).await;
        }
    }

    println!("All bandwidth tests completed");
    Ok(all_events)
}

fn tag_network(events: Vec<Event>, is_host_network: bool) -> Vec<Event> {
    tag_network_str(events, if is_host_network { "host" } else { "overlay" })
}

/// Agents don't know which fleet they belong to; the driver stamps the
/// network mode onto collected events.
fn tag_network_str(mut events: Vec<Event>, network: &str) -> Vec<Event> {
    for event in &mut events {
        event.network = Some(network.to_string());
    }
    events
}
