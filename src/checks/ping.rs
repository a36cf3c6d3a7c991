//! ICMP reachability check
//!
//! Sends raw ICMP echoes at a fixed 200 ms interval (needs CAP_NET_RAW). When
//! a raw socket cannot be opened, falls back to the system `ping` utility and
//! parses its output instead.

use crate::checks::Check;
use crate::error::Result;
use crate::types::{CheckResult, CheckStatus, PingDetails};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;
use surge_ping::{Client, Config, IcmpPacket, PingIdentifier, PingSequence, ICMP};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Interval between echo requests
const PACKET_INTERVAL: Duration = Duration::from_millis(200);

/// Per-echo reply deadline
const REPLY_TIMEOUT: Duration = Duration::from_secs(1);

static STATS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) packets transmitted, (\d+) received, ([\d.]+)% packet loss").unwrap()
});

static RTT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"rtt min/avg/max/mdev = ([\d.]+)/([\d.]+)/([\d.]+)/([\d.]+) ms").unwrap()
});

static SAMPLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"time=([\d.]+) ms").unwrap());

pub struct PingCheck {
    pub count: u32,
}

impl PingCheck {
    pub fn new(count: u32) -> Self {
        Self {
            count: if count == 0 { 10 } else { count },
        }
    }

    /// Total budget for a run: one second per requested packet
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.count as u64)
    }

    async fn ping_raw(&self, ip: IpAddr) -> std::result::Result<PingDetails, String> {
        let config = match ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&config).map_err(|e| format!("icmp socket: {e}"))?;

        let ident = PingIdentifier(std::process::id() as u16);
        let mut pinger = client.pinger(ip, ident).await;
        pinger.timeout(REPLY_TIMEOUT);

        let payload = [0u8; 56];
        let mut rtts: Vec<f64> = Vec::new();
        let mut ttl = 0u32;

        for seq in 0..self.count {
            match pinger.ping(PingSequence(seq as u16), &payload).await {
                Ok((packet, rtt)) => {
                    rtts.push(rtt.as_secs_f64() * 1000.0);
                    if let IcmpPacket::V4(v4) = packet {
                        ttl = v4.get_ttl().unwrap_or(0) as u32;
                    }
                }
                Err(_) => {} // counted as loss
            }

            if seq + 1 < self.count {
                tokio::time::sleep(PACKET_INTERVAL).await;
            }
        }

        let received = rtts.len() as u32;
        let loss = (self.count - received) as f64 / self.count as f64 * 100.0;

        let mut details = PingDetails {
            packets_sent: self.count,
            packets_received: received,
            packet_loss_percent: loss,
            ttl,
            ..Default::default()
        };

        if !rtts.is_empty() {
            details.min_latency_ms = rtts.iter().cloned().fold(f64::INFINITY, f64::min);
            details.max_latency_ms = rtts.iter().cloned().fold(0.0, f64::max);
            details.avg_latency_ms = rtts.iter().sum::<f64>() / rtts.len() as f64;
        }

        Ok(details)
    }

    async fn ping_subprocess(&self, target: &str) -> std::result::Result<PingDetails, String> {
        let output = Command::new("ping")
            .args(["-c", &self.count.to_string(), "-W", "1", target])
            .output()
            .await
            .map_err(|e| format!("ping failed: {e}"))?;

        if !output.status.success() && output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("ping failed: {}", stderr.trim()));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        parse_ping_output(&text).ok_or_else(|| "failed to parse ping output".to_string())
    }
}

impl Default for PingCheck {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Parse the summary and rtt lines of `ping` output. When the rtt statistics
/// line is missing, min/avg/max are computed from per-response samples.
pub fn parse_ping_output(output: &str) -> Option<PingDetails> {
    let mut details = PingDetails::default();
    let mut parsed_any = false;

    if let Some(caps) = STATS_RE.captures(output) {
        details.packets_sent = caps[1].parse().ok()?;
        details.packets_received = caps[2].parse().ok()?;
        details.packet_loss_percent = caps[3].parse().ok()?;
        parsed_any = true;
    }

    if let Some(caps) = RTT_RE.captures(output) {
        details.min_latency_ms = caps[1].parse().ok()?;
        details.avg_latency_ms = caps[2].parse().ok()?;
        details.max_latency_ms = caps[3].parse().ok()?;
        parsed_any = true;
    } else {
        let samples: Vec<f64> = SAMPLE_RE
            .captures_iter(output)
            .filter_map(|c| c[1].parse().ok())
            .collect();
        if !samples.is_empty() {
            details.min_latency_ms = samples.iter().cloned().fold(f64::INFINITY, f64::min);
            details.max_latency_ms = samples.iter().cloned().fold(0.0, f64::max);
            details.avg_latency_ms = samples.iter().sum::<f64>() / samples.len() as f64;
            parsed_any = true;
        }
    }

    parsed_any.then_some(details)
}

#[async_trait]
impl Check for PingCheck {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn run(&self, _cancel: &CancellationToken, target: &str) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.name(), target);

        let resolved = tokio::net::lookup_host((target, 0u16))
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .map(|a| a.ip());

        let outcome = match resolved {
            Some(ip) => match self.ping_raw(ip).await {
                Ok(details) => Ok(details),
                // No raw socket available; shell out instead
                Err(e) if e.starts_with("icmp socket") => self.ping_subprocess(target).await,
                Err(e) => Err(e),
            },
            None => Err(format!("cannot resolve {target}")),
        };

        let details = match outcome {
            Ok(details) => details,
            Err(e) => return Ok(result.fail(e)),
        };

        if details.packet_loss_percent > 0.0 {
            result.status = CheckStatus::Fail;
            result.error = Some(format!("{:.1}% packet loss", details.packet_loss_percent));
        }

        result.details.insert("ping".to_string(), json!(details));
        Ok(result)
    }

    fn format_summary(&self, details: Option<&Value>, _debug: bool) -> String {
        let Some(ping) = details.and_then(|d| d.get("ping")) else {
            return String::new();
        };

        let sent = ping.get("packets_sent").and_then(Value::as_u64).unwrap_or(0);
        let received = ping
            .get("packets_received")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let avg = ping
            .get("avg_latency_ms")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        format!("{received}/{sent} packets, avg {avg:.2}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_OUTPUT: &str = "\
PING 10.0.0.1 (10.0.0.1) 56(84) bytes of data.
64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=0.41 ms
64 bytes from 10.0.0.1: icmp_seq=2 ttl=64 time=0.38 ms

--- 10.0.0.1 ping statistics ---
2 packets transmitted, 2 received, 0% packet loss, time 1001ms
rtt min/avg/max/mdev = 0.380/0.395/0.410/0.015 ms
";

    const NO_RTT_LINE: &str = "\
64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=1.0 ms
64 bytes from 10.0.0.1: icmp_seq=2 ttl=64 time=3.0 ms
64 bytes from 10.0.0.1: icmp_seq=3 ttl=64 time=2.0 ms
3 packets transmitted, 3 received, 0% packet loss
";

    #[test]
    fn test_parse_full_output() {
        let details = parse_ping_output(FULL_OUTPUT).unwrap();
        assert_eq!(details.packets_sent, 2);
        assert_eq!(details.packets_received, 2);
        assert_eq!(details.packet_loss_percent, 0.0);
        assert_eq!(details.min_latency_ms, 0.380);
        assert_eq!(details.avg_latency_ms, 0.395);
        assert_eq!(details.max_latency_ms, 0.410);
    }

    #[test]
    fn test_parse_computes_stats_from_samples() {
        let details = parse_ping_output(NO_RTT_LINE).unwrap();
        assert_eq!(details.packets_sent, 3);
        assert_eq!(details.min_latency_ms, 1.0);
        assert_eq!(details.avg_latency_ms, 2.0);
        assert_eq!(details.max_latency_ms, 3.0);
    }

    #[test]
    fn test_parse_loss_percentage() {
        let output = "5 packets transmitted, 3 received, 40% packet loss";
        let details = parse_ping_output(output).unwrap();
        assert_eq!(details.packets_received, 3);
        assert_eq!(details.packet_loss_percent, 40.0);
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert!(parse_ping_output("command not found").is_none());
    }

    #[test]
    fn test_count_default_and_timeout() {
        assert_eq!(PingCheck::new(0).count, 10);
        assert_eq!(PingCheck::new(5).timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_format_summary() {
        let check = PingCheck::default();
        let details = json!({"ping": {"packets_sent": 5, "packets_received": 5, "avg_latency_ms": 0.42}});
        assert_eq!(
            check.format_summary(Some(&details), false),
            "5/5 packets, avg 0.42ms"
        );
    }
}
