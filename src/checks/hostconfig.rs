//! Host configuration inspection
//!
//! Verifies the kernel-level settings Kubernetes networking depends on:
//! IPv4 forwarding, the MTU of the default-route interface, system load, and
//! a curated set of kernel parameters.

use crate::checks::procfs::read_sysctl;
use crate::checks::Check;
use crate::error::Result;
use crate::types::{CheckResult, CheckStatus, HostConfigDetails};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::LazyLock;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

static DEV_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"dev (\S+)").unwrap());
static MTU_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"mtu (\d+)").unwrap());

/// Kernel parameters recorded alongside the pass/fail checks
const KERNEL_PARAMS: [(&str, &str); 3] = [
    ("net.ipv4.conf.all.rp_filter", "sys/net/ipv4/conf/all/rp_filter"),
    (
        "net.bridge.bridge-nf-call-iptables",
        "sys/net/bridge/bridge-nf-call-iptables",
    ),
    (
        "net.ipv4.ip_local_port_range",
        "sys/net/ipv4/ip_local_port_range",
    ),
];

pub struct HostConfigCheck;

impl HostConfigCheck {
    fn proc_root() -> PathBuf {
        PathBuf::from("/proc")
    }

    /// MTU of the interface carrying the default route. Resolving the route
    /// first matters: the first interface listed is frequently not the one
    /// cluster traffic uses.
    async fn default_route_mtu() -> std::result::Result<u32, String> {
        let route = Command::new("ip")
            .args(["route", "show", "default"])
            .output()
            .await
            .map_err(|e| format!("failed to get default route: {e}"))?;

        let route_text = String::from_utf8_lossy(&route.stdout);
        let iface = DEV_RE
            .captures(&route_text)
            .map(|c| c[1].to_string())
            .ok_or_else(|| "no default route found".to_string())?;

        let link = Command::new("ip")
            .args(["link", "show", &iface])
            .output()
            .await
            .map_err(|e| format!("failed to get link info for {iface}: {e}"))?;

        let link_text = String::from_utf8_lossy(&link.stdout);
        parse_mtu(&link_text).ok_or_else(|| format!("could not find MTU for interface {iface}"))
    }

    fn load_average(proc_root: &PathBuf) -> std::result::Result<f64, String> {
        let data = std::fs::read_to_string(proc_root.join("loadavg"))
            .map_err(|e| format!("failed to read loadavg: {e}"))?;

        data.split_whitespace()
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| "unexpected loadavg format".to_string())
    }
}

/// Extract the MTU value from `ip link show` output
pub fn parse_mtu(link_output: &str) -> Option<u32> {
    MTU_RE
        .captures(link_output)
        .and_then(|c| c[1].parse().ok())
}

#[async_trait]
impl Check for HostConfigCheck {
    fn name(&self) -> &'static str {
        "hostconfig"
    }

    async fn run(&self, _cancel: &CancellationToken, _target: &str) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.name(), "localhost");
        let proc_root = Self::proc_root();

        let mut details = HostConfigDetails::default();
        let mut issues = Vec::new();

        match read_sysctl(proc_root.join("sys/net/ipv4/ip_forward")) {
            Ok(v) if v == "1" => details.ip_forwarding = true,
            Ok(_) => {
                details.ip_forwarding = false;
                issues.push(
                    "IP forwarding is disabled (should be enabled for Kubernetes)".to_string(),
                );
            }
            Err(e) => issues.push(format!("failed to read ip_forward: {e}")),
        }

        match Self::default_route_mtu().await {
            Ok(mtu) => details.mtu = mtu,
            Err(e) => issues.push(format!("failed to get MTU: {e}")),
        }

        let num_cpu = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        details.num_cpu = Some(num_cpu);

        match Self::load_average(&proc_root) {
            Ok(load) => {
                details.load_average = Some(load);
                let threshold = num_cpu as f64 * 0.8;
                if load > threshold {
                    issues.push(format!(
                        "load average {load:.2} exceeds 80% of available CPUs ({num_cpu}), threshold: {threshold:.2}"
                    ));
                }
            }
            Err(e) => issues.push(format!("failed to read load average: {e}")),
        }

        for (name, rel_path) in KERNEL_PARAMS {
            if let Ok(value) = read_sysctl(proc_root.join(rel_path)) {
                details.kernel_params.insert(name.to_string(), value);
            }
        }

        if !issues.is_empty() {
            result.status = CheckStatus::Fail;
            details.issues = issues;
        }

        result
            .details
            .insert("hostconfig".to_string(), json!(details));
        Ok(result)
    }

    fn is_local(&self) -> bool {
        true
    }

    fn always_show(&self) -> bool {
        true
    }

    fn format_summary(&self, details: Option<&Value>, _debug: bool) -> String {
        let Some(hc) = details.and_then(|d| d.get("hostconfig")) else {
            return String::new();
        };

        let forwarding = if hc
            .get("ip_forwarding")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            "enabled"
        } else {
            "disabled"
        };
        let mtu = hc.get("mtu").and_then(Value::as_u64).unwrap_or(0);
        let load = hc
            .get("load_average")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let cpus = hc.get("num_cpu").and_then(Value::as_u64).unwrap_or(0);

        let mut summary =
            format!("IP forwarding: {forwarding}, MTU: {mtu}, Load avg: {load:.2}/{cpus} CPUs");

        if let Some(issues) = hc.get("issues").and_then(Value::as_array) {
            if !issues.is_empty() {
                let strs: Vec<&str> = issues.iter().filter_map(Value::as_str).collect();
                summary = format!("{summary} | {}", strs.join("; "));
            }
        }

        summary
    }
}
