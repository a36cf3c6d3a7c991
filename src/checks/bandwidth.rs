//! Throughput check
//!
//! Drives `iperf3` in client mode with JSON output against an agent's
//! re-arming one-shot server. A busy server is retried with back-off since
//! pair runs overlap the server's restart window.

use crate::checks::Check;
use crate::error::Result;
use crate::types::{BandwidthDetails, CheckResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Measurement length in seconds
pub const BANDWIDTH_DURATION: u64 = 30;

/// Short-form measurement for quick checks
pub const BANDWIDTH_SHORT_DURATION: u64 = 10;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct Iperf3Output {
    #[serde(default)]
    error: String,
    #[serde(default)]
    end: Iperf3End,
}

#[derive(Deserialize, Default)]
struct Iperf3End {
    #[serde(default)]
    sum_sent: Iperf3SumSent,
}

#[derive(Deserialize, Default)]
struct Iperf3SumSent {
    #[serde(default)]
    bits_per_second: f64,
    #[serde(default)]
    retransmits: u64,
}

pub struct BandwidthCheck {
    pub duration: u64,
}

impl BandwidthCheck {
    pub fn new(duration: u64) -> Self {
        Self { duration }
    }

    /// Wrapper budget: the measurement itself plus connection overhead
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.duration + 5)
    }

    async fn run_iperf3(
        &self,
        target: &str,
        attempt: u32,
    ) -> std::result::Result<BandwidthDetails, String> {
        debug!(target: "bandwidth", %target, attempt, duration = self.duration, "starting iperf3 client");

        let output = Command::new("iperf3")
            .args(["-c", target, "-J", "-t", &self.duration.to_string()])
            .output()
            .await
            .map_err(|e| format!("iperf3 failed: {e}"))?;

        self.parse_output(&output.stdout)
    }

    fn parse_output(&self, output: &[u8]) -> std::result::Result<BandwidthDetails, String> {
        let parsed: Iperf3Output = serde_json::from_slice(output)
            .map_err(|e| format!("failed to parse iperf3 JSON: {e}"))?;

        if !parsed.error.is_empty() {
            return Err(format!("iperf3: {}", parsed.error));
        }

        let details = BandwidthDetails {
            bandwidth_mbps: parsed.end.sum_sent.bits_per_second / 1_000_000.0,
            retransmits: parsed.end.sum_sent.retransmits,
            protocol: "tcp".to_string(),
            duration_seconds: self.duration,
        };

        if details.bandwidth_mbps == 0.0 {
            return Err("iperf3 reported 0 bandwidth - test may have failed".to_string());
        }

        Ok(details)
    }
}

impl Default for BandwidthCheck {
    fn default() -> Self {
        Self::new(BANDWIDTH_DURATION)
    }
}

#[async_trait]
impl Check for BandwidthCheck {
    fn name(&self) -> &'static str {
        "bandwidth"
    }

    async fn run(&self, cancel: &CancellationToken, target: &str) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.name(), target);

        let mut last_err = String::new();
        for attempt in 1..=MAX_RETRIES {
            match self.run_iperf3(target, attempt).await {
                Ok(details) => {
                    debug!(target: "bandwidth",
                        mbps = details.bandwidth_mbps,
                        retransmits = details.retransmits,
                        "measurement complete");
                    result.details.insert("bandwidth".to_string(), json!(details));
                    return Ok(result);
                }
                Err(e) => {
                    let busy = e.contains("server is busy");
                    last_err = e;
                    if busy && attempt < MAX_RETRIES {
                        debug!(target: "bandwidth", attempt, "server busy, backing off");
                        tokio::select! {
                            _ = tokio::time::sleep(RETRY_DELAY) => continue,
                            _ = cancel.cancelled() => {
                                return Ok(result.fail("cancelled while waiting to retry"));
                            }
                        }
                    }
                    break;
                }
            }
        }

        Ok(result.fail(last_err))
    }

    fn always_show(&self) -> bool {
        true
    }

    fn format_summary(&self, details: Option<&Value>, _debug: bool) -> String {
        let Some(bw) = details.and_then(|d| d.get("bandwidth")) else {
            return String::new();
        };

        let mbps = bw
            .get("bandwidth_mbps")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let retransmits = bw.get("retransmits").and_then(Value::as_u64).unwrap_or(0);

        format!("{mbps:.2} Mbps, {retransmits} retransmits")
    }
}
