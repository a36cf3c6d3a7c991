//! Check results and per-check detail payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Incomplete,
    Skipped,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "pass"),
            CheckStatus::Fail => write!(f, "fail"),
            CheckStatus::Incomplete => write!(f, "incomplete"),
            CheckStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one check against one target.
///
/// Checks always produce a result, even on failure: errors are folded into
/// `status` and `error` rather than propagated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node: String,
    pub check: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Details keyed by check name, shape fixed per check
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
}

impl CheckResult {
    pub fn new(check: &str, target: &str) -> Self {
        let now = Utc::now();
        Self {
            node: String::new(),
            check: check.to_string(),
            target: target.to_string(),
            status: CheckStatus::Pass,
            error: None,
            details: Map::new(),
            start_time: now,
            end_time: now,
            duration_ms: 0.0,
        }
    }

    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = CheckStatus::Fail;
        self.error = Some(error.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Details for one DNS lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsLookupDetails {
    pub server: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolved_ips: Vec<String>,
    pub latency_ms: f64,
}

/// Details for an ICMP reachability check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingDetails {
    pub packets_sent: u32,
    pub packets_received: u32,
    pub packet_loss_percent: f64,
    pub min_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    #[serde(default)]
    pub ttl: u32,
}

/// Details for one probed port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortProbeDetails {
    pub port: u16,
    pub protocol: String,
    pub open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Details for a throughput measurement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BandwidthDetails {
    pub bandwidth_mbps: f64,
    pub retransmits: u64,
    pub protocol: String,
    pub duration_seconds: u64,
}

/// Details for the host configuration inspection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfigDetails {
    pub ip_forwarding: bool,
    pub mtu: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_cpu: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_average: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kernel_params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

/// Details for the connection tracking inspection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConntrackDetails {
    pub entries: u64,
    pub max_entries: u64,
    pub inserts_failed: u64,
    pub drop_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

/// Details for the packet filter frontend inspection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IptablesDetails {
    pub legacy_rule_count: u64,
    pub nftable_rule_count: u64,
    pub duplicate_rules: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}
