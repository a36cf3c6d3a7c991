//! Deploy lifecycle command: install / uninstall / status / template

use crate::cli::{DeployArgs, DeployCommand};
use crate::client::create_client;
use crate::error::Result;
use crate::k8s;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const READY_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn run_deploy(context: Option<&str>, namespace: &str, args: &DeployArgs) -> Result<()> {
    match &args.command {
        DeployCommand::Install { image } => {
            install(context, namespace, image.as_deref()).await
        }
        DeployCommand::Uninstall => uninstall(context, namespace).await,
        DeployCommand::Status => status(context, namespace).await,
        DeployCommand::Template { image } => {
            print!("{}", k8s::all_manifests(namespace, image.as_deref()));
            Ok(())
        }
    }
}

async fn install(context: Option<&str>, namespace: &str, image: Option<&str>) -> Result<()> {
    println!("Installing netprobe in namespace: {namespace}");

    let client = create_client(context).await?;
    k8s::install(&client, namespace, image).await?;
    println!("Resources deployed successfully");

    println!("\nWaiting for DaemonSets to be ready...");
    let cancel = CancellationToken::new();

    for name in ["netprobe-host", "netprobe-overlay"] {
        match k8s::wait_for_daemonset_ready(&client, &cancel, namespace, name, READY_TIMEOUT).await
        {
            Ok(()) => println!("{name} ready"),
            Err(e) => eprintln!("Warning: {name} not ready: {e}"),
        }
    }

    println!("\nInstallation complete! Use 'netprobe run' to start testing.");
    Ok(())
}

async fn uninstall(context: Option<&str>, namespace: &str) -> Result<()> {
    println!("Uninstalling netprobe from namespace: {namespace}");

    let client = create_client(context).await?;
    k8s::uninstall(&client, namespace).await?;

    println!("Resources removed successfully");
    Ok(())
}

async fn status(context: Option<&str>, namespace: &str) -> Result<()> {
    let client = create_client(context).await?;
    println!("Checking status in namespace: {namespace}\n");

    print_daemonset_status(&client, namespace, "netprobe-host", "Host DaemonSet").await;
    print_daemonset_status(&client, namespace, "netprobe-overlay", "Overlay DaemonSet").await;

    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let lp = ListParams::default().labels("app=netprobe");
    if let Ok(pod_list) = pods.list(&lp).await {
        if !pod_list.items.is_empty() {
            println!("\nPods:");
            for pod in pod_list.items {
                let name = pod.metadata.name.as_deref().unwrap_or("unknown");
                let node = pod
                    .spec
                    .as_ref()
                    .and_then(|s| s.node_name.as_deref())
                    .unwrap_or("unknown");
                let phase = pod
                    .status
                    .as_ref()
                    .and_then(|s| s.phase.as_deref())
                    .unwrap_or("Unknown");
                let ready = pod
                    .status
                    .as_ref()
                    .and_then(|s| s.conditions.as_ref())
                    .map(|conds| {
                        conds
                            .iter()
                            .any(|c| c.type_ == "Ready" && c.status == "True")
                    })
                    .unwrap_or(false);

                println!(
                    "  {name} ({node}) - {phase} - {}",
                    if ready { "Ready" } else { "Not Ready" }
                );
            }
        }
    }

    Ok(())
}

async fn print_daemonset_status(client: &Client, namespace: &str, name: &str, label: &str) {
    let api: Api<DaemonSet> = Api::namespaced(client.clone(), namespace);
    match api.get(name).await {
        Ok(ds) => {
            let status = ds.status.unwrap_or_default();
            println!("{label}:");
            println!("  Desired:   {}", status.desired_number_scheduled);
            println!("  Ready:     {}", status.number_ready);
            println!("  Available: {}", status.number_available.unwrap_or(0));
        }
        Err(_) => println!("{label}: Not found"),
    }
}
