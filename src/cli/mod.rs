//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "netprobe",
    version,
    about = "Network diagnostics for Kubernetes clusters",
    long_about = "Coordinated network diagnostics for Kubernetes clusters (RKE2/K3s).\n\
                  Diagnoses connectivity issues, DNS problems, port accessibility, and more."
)]
pub struct Cli {
    /// Kubernetes context to use
    #[arg(long, global = true, env = "NETPROBE_CONTEXT")]
    pub context: Option<String>,

    /// Namespace for the agent deployment
    #[arg(short = 'n', long, global = true, default_value = "netprobe")]
    pub namespace: String,

    /// Output format
    #[arg(short = 'o', long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Show passing results and per-probe detail in tables
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run coordinated network tests across the cluster
    Run(RunArgs),

    /// Run standalone local checks
    Check(CheckArgs),

    /// Run as agent (for DaemonSet pods)
    Agent(AgentArgs),

    /// Manage the agent deployment
    Deploy(DeployArgs),

    /// Print version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Checks to run (dns,ping,ports,bandwidth,hostconfig,conntrack,iptables)
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = ["dns".to_string(), "ping".to_string(), "hostconfig".to_string(), "conntrack".to_string(), "iptables".to_string()]
    )]
    pub checks: Vec<String>,

    /// Skip the host network path
    #[arg(long)]
    pub no_host_network: bool,

    /// Skip the overlay network path
    #[arg(long)]
    pub no_overlay: bool,

    /// Override the default port catalog (format: 8080/tcp:name)
    #[arg(long, value_delimiter = ',')]
    pub ports: Vec<String>,

    /// Overall timeout per run phase (0 = no timeout)
    #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Remove the deployment after the run
    #[arg(long)]
    pub cleanup: bool,

    /// Override the agent image used when deploying
    #[arg(long)]
    pub image: Option<String>,
}

#[derive(Args, Clone)]
pub struct CheckArgs {
    #[command(subcommand)]
    pub command: CheckCommand,
}

#[derive(Subcommand, Clone)]
pub enum CheckCommand {
    /// Test DNS resolution
    Dns {
        /// Names to resolve
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,

        /// DNS server override (queried over UDP port 53)
        #[arg(long)]
        server: Option<String>,
    },

    /// Test ICMP connectivity
    Ping {
        /// Target hosts to ping
        #[arg(long, value_delimiter = ',', required = true)]
        targets: Vec<String>,

        /// Echo requests per target
        #[arg(long, default_value_t = 10)]
        count: u32,
    },

    /// Test port connectivity
    Ports {
        /// Target hosts
        #[arg(long, value_delimiter = ',', required = true)]
        targets: Vec<String>,

        /// Ports to check (format: 8080/tcp:name)
        #[arg(long, value_delimiter = ',')]
        ports: Vec<String>,
    },

    /// Test network bandwidth against an iperf3 server
    Bandwidth {
        /// Target host
        #[arg(long, required = true)]
        target: String,

        /// Use the short 10-second measurement
        #[arg(long)]
        short: bool,
    },

    /// Check host configuration
    Hostconfig,

    /// Check conntrack statistics
    Conntrack,

    /// Check iptables configuration
    Iptables,
}

#[derive(Args, Clone)]
pub struct AgentArgs {
    /// Agent mode: 'configmap' is the only supported mode
    #[arg(long, default_value = "configmap")]
    pub mode: String,

    /// ConfigMap reference in format NAMESPACE/CONFIGMAPNAME
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Args, Clone)]
pub struct DeployArgs {
    #[command(subcommand)]
    pub command: DeployCommand,
}

#[derive(Subcommand, Clone)]
pub enum DeployCommand {
    /// Deploy DaemonSets, RBAC, and the shared ConfigMap
    Install {
        /// Override the default agent image
        #[arg(long)]
        image: Option<String>,
    },

    /// Remove all deployed resources
    Uninstall,

    /// Check deployment status
    Status,

    /// Print manifests to stdout for customization
    Template {
        /// Override the default agent image
        #[arg(long)]
        image: Option<String>,
    },
}

#[derive(Args, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
