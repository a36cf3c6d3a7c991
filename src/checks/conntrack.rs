//! Connection tracking inspection
//!
//! Reads the nf_conntrack table counters. The statistics file encodes its
//! values in hex, one CPU per line; only the headers and the first line are
//! needed for the totals checked here.

use crate::checks::procfs::read_sysctl;
use crate::checks::Check;
use crate::error::Result;
use crate::types::{CheckResult, CheckStatus, ConntrackDetails};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub struct ConntrackCheck;

impl ConntrackCheck {
    fn inspect(proc_root: &Path) -> CheckResult {
        let mut result = CheckResult::new("conntrack", "localhost");
        let mut details = ConntrackDetails::default();
        let mut issues = Vec::new();

        match read_sysctl(proc_root.join("sys/net/netfilter/nf_conntrack_count")) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                details.issues = vec!["conntrack module not loaded".to_string()];
                result.details.insert("conntrack".to_string(), json!(details));
                return result.fail("conntrack module not loaded");
            }
            Err(e) => issues.push(format!("failed to read conntrack count: {e}")),
            Ok(v) => details.entries = v.parse().unwrap_or(0),
        }

        match read_sysctl(proc_root.join("sys/net/netfilter/nf_conntrack_max")) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => issues.push(format!("failed to read conntrack max: {e}")),
            Ok(v) => details.max_entries = v.parse().unwrap_or(0),
        }

        match std::fs::read_to_string(proc_root.join("net/stat/nf_conntrack")) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => issues.push(format!("failed to read conntrack stats: {e}")),
            Ok(text) => match parse_conntrack_stats(&text) {
                Ok(stats) => {
                    details.inserts_failed = stats.get("insert_failed").copied().unwrap_or(0);
                    details.drop_count = stats.get("drop").copied().unwrap_or(0);

                    if details.inserts_failed > 0 {
                        issues.push(format!(
                            "conntrack insert failures detected: {}",
                            details.inserts_failed
                        ));
                    }
                    if details.drop_count > 0 {
                        issues.push(format!(
                            "conntrack drops detected: {}",
                            details.drop_count
                        ));
                    }
                }
                Err(e) => issues.push(format!("failed to read conntrack stats: {e}")),
            },
        }

        if details.max_entries > 0 {
            let utilization = details.entries as f64 / details.max_entries as f64 * 100.0;
            if utilization > 80.0 {
                issues.push(format!(
                    "conntrack table {utilization:.1}% full ({}/{})",
                    details.entries, details.max_entries
                ));
            }
        }

        if !issues.is_empty() {
            result.status = CheckStatus::Fail;
            result.error = Some(issues.join("; "));
            details.issues = issues;
        }

        result.details.insert("conntrack".to_string(), json!(details));
        result
    }
}

/// Parse the header/value layout of /proc/net/stat/nf_conntrack (hex counters)
pub fn parse_conntrack_stats(text: &str) -> std::result::Result<HashMap<String, u64>, String> {
    let mut lines = text.lines();
    let headers: Vec<&str> = lines
        .next()
        .ok_or("unexpected conntrack stats format")?
        .split_whitespace()
        .collect();
    let values: Vec<&str> = lines
        .next()
        .ok_or("unexpected conntrack stats format")?
        .split_whitespace()
        .collect();

    if headers.len() != values.len() {
        return Err("header/value count mismatch".to_string());
    }

    let mut stats = HashMap::new();
    for (header, value) in headers.iter().zip(values.iter()) {
        if let Ok(parsed) = u64::from_str_radix(value, 16) {
            stats.insert(header.to_string(), parsed);
        }
    }
    Ok(stats)
}

#[async_trait]
impl Check for ConntrackCheck {
    fn name(&self) -> &'static str {
        "conntrack"
    }

    async fn run(&self, _cancel: &CancellationToken, _target: &str) -> Result<CheckResult> {
        Ok(Self::inspect(Path::new("/proc")))
    }

    fn is_local(&self) -> bool {
        true
    }

    fn format_summary(&self, details: Option<&Value>, _debug: bool) -> String {
        let Some(ct) = details.and_then(|d| d.get("conntrack")) else {
            return String::new();
        };

        if let Some(issues) = ct.get("issues").and_then(Value::as_array) {
            if !issues.is_empty() {
                return format!("{} issues", issues.len());
            }
        }

        let entries = ct.get("entries").and_then(Value::as_u64).unwrap_or(0);
        let max = ct.get("max_entries").and_then(Value::as_u64).unwrap_or(0);

        if max > 0 {
            let utilization = entries as f64 / max as f64 * 100.0;
            format!("{entries}/{max} entries ({utilization:.1}%)")
        } else if entries > 0 {
            format!("{entries} entries")
        } else {
            "OK".to_string()
        }
    }
}
