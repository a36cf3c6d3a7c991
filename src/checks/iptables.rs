//! Packet filter frontend inspection
//!
//! Counts rules under both the legacy and the nft-backed iptables frontends.
//! Rules split across both backends is a classic source of silently dropped
//! cluster traffic.

use crate::checks::Check;
use crate::error::Result;
use crate::types::{CheckResult, CheckStatus, IptablesDetails};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

pub struct IptablesCheck;

impl IptablesCheck {
    async fn count_rules(binary: &str) -> std::result::Result<u64, String> {
        let output = Command::new(binary)
            .arg("-S")
            .output()
            .await
            .map_err(|e| e.to_string())?;

        if !output.status.success() {
            return Err(format!("{binary} exited with {}", output.status));
        }

        Ok(count_rule_lines(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn detect_active_backend() -> std::result::Result<String, String> {
        let output = Command::new("iptables")
            .arg("--version")
            .output()
            .await
            .map_err(|e| e.to_string())?;

        let version = String::from_utf8_lossy(&output.stdout).to_lowercase();
        Ok(if version.contains("nf_tables") {
            "nftables".to_string()
        } else if version.contains("legacy") {
            "legacy".to_string()
        } else {
            "unknown".to_string()
        })
    }
}

/// Count non-empty, non-comment lines of `iptables -S` output
pub fn count_rule_lines(output: &str) -> u64 {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .count() as u64
}

#[async_trait]
impl Check for IptablesCheck {
    fn name(&self) -> &'static str {
        "iptables"
    }

    async fn run(&self, _cancel: &CancellationToken, _target: &str) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.name(), "localhost");
        let mut details = IptablesDetails::default();
        let mut issues = Vec::new();

        if let Ok(count) = Self::count_rules("iptables-legacy").await {
            details.legacy_rule_count = count;
        }
        if let Ok(count) = Self::count_rules("iptables-nft").await {
            details.nftable_rule_count = count;
        }

        if details.legacy_rule_count > 0 && details.nftable_rule_count > 0 {
            details.duplicate_rules = details.legacy_rule_count + details.nftable_rule_count;
            issues.push(format!(
                "both iptables-legacy ({} rules) and iptables-nft ({} rules) are active, potential conflicts",
                details.legacy_rule_count, details.nftable_rule_count
            ));
        }

        if let Ok(backend) = Self::detect_active_backend().await {
            issues.push(format!("detected active backend: {backend}"));
        }

        if details.duplicate_rules > 0 {
            result.status = CheckStatus::Fail;
            result.error = Some("iptables configuration conflict detected".to_string());
        }

        details.issues = issues;
        result.details.insert("iptables".to_string(), json!(details));
        Ok(result)
    }

    fn is_local(&self) -> bool {
        true
    }

    fn format_summary(&self, details: Option<&Value>, debug: bool) -> String {
        let Some(ipt) = details.and_then(|d| d.get("iptables")) else {
            return String::new();
        };

        if let Some(issues) = ipt.get("issues").and_then(Value::as_array) {
            if !issues.is_empty() {
                return format!("{} issues", issues.len());
            }
        }

        if debug {
            let legacy = ipt
                .get("legacy_rule_count")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let nft = ipt
                .get("nftable_rule_count")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            return format!("{legacy} legacy, {nft} nftables rules");
        }

        "OK".to_string()
    }
}
