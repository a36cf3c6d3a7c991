//! Port connectivity check
//!
//! TCP ports are probed with a plain dial. UDP ports are probed through a
//! connected socket so ICMP port-unreachable surfaces as a read error; a
//! silent port is reported closed via read timeout, which is the best a
//! UDP probe can do without service-specific payloads.

use crate::checks::Check;
use crate::error::Result;
use crate::types::{
    default_ports, CheckResult, CheckStatus, PortProbeDetails, PortSpec, Protocol,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::net::{TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;

/// Read deadline for the UDP echo probe
const UDP_READ_TIMEOUT: Duration = Duration::from_secs(2);

pub struct PortsCheck {
    pub ports: Vec<PortSpec>,
}

impl PortsCheck {
    pub fn new(ports: Vec<PortSpec>) -> Self {
        let ports = if ports.is_empty() {
            default_ports()
        } else {
            ports
        };
        Self { ports }
    }

    async fn probe_port(&self, host: &str, spec: &PortSpec) -> PortProbeDetails {
        let mut details = PortProbeDetails {
            port: spec.port,
            protocol: spec.protocol.to_string(),
            open: false,
            latency_ms: None,
            error: None,
        };

        let address = format!("{host}:{}", spec.port);
        let start = Instant::now();

        match spec.protocol {
            Protocol::Tcp => match TcpStream::connect(&address).await {
                Ok(_stream) => {
                    details.open = true;
                    details.latency_ms = Some(start.elapsed().as_secs_f64() * 1000.0);
                }
                Err(e) => details.error = Some(e.to_string()),
            },
            Protocol::Udp => {
                details = self.probe_udp(&address, details, start).await;
            }
        }

        details
    }

    async fn probe_udp(
        &self,
        address: &str,
        mut details: PortProbeDetails,
        start: Instant,
    ) -> PortProbeDetails {
        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(s) => s,
            Err(e) => {
                details.error = Some(e.to_string());
                return details;
            }
        };

        if let Err(e) = socket.connect(address).await {
            details.error = Some(e.to_string());
            return details;
        }

        if let Err(e) = socket.send(&[0u8]).await {
            details.error = Some(e.to_string());
            return details;
        }

        let mut buf = [0u8; 1];
        match tokio::time::timeout(UDP_READ_TIMEOUT, socket.recv(&mut buf)).await {
            Ok(Ok(_n)) => {
                details.open = true;
                details.latency_ms = Some(start.elapsed().as_secs_f64() * 1000.0);
            }
            // ICMP unreachable delivered as a read error on connected sockets
            Ok(Err(e)) => details.error = Some(e.to_string()),
            Err(_) => details.error = Some("timed out waiting for response".to_string()),
        }

        details
    }
}

impl Default for PortsCheck {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Check for PortsCheck {
    fn name(&self) -> &'static str {
        "ports"
    }

    async fn run(&self, _cancel: &CancellationToken, target: &str) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.name(), target);

        let mut probes = Vec::new();
        let mut failed_ports = Vec::new();

        for spec in &self.ports {
            let probe = self.probe_port(target, spec).await;
            if !probe.open {
                failed_ports.push(format!("{}/{}:{}", spec.port, spec.protocol, spec.name));
            }
            probes.push(probe);
        }

        result.details.insert("ports".to_string(), json!(probes));

        if !failed_ports.is_empty() {
            result.status = CheckStatus::Fail;
            result.error = Some(failed_ports.join(", "));
            result
                .details
                .insert("failed_ports".to_string(), json!(failed_ports));
        }

        Ok(result)
    }

    fn format_summary(&self, details: Option<&Value>, debug: bool) -> String {
        let Some(ports) = details.and_then(|d| d.get("ports")).and_then(Value::as_array)
        else {
            return String::new();
        };

        let mut open = 0;
        let mut lines = Vec::new();

        for p in ports {
            let port = p.get("port").and_then(Value::as_u64).unwrap_or(0);
            let protocol = p.get("protocol").and_then(Value::as_str).unwrap_or("");
            let is_open = p.get("open").and_then(Value::as_bool).unwrap_or(false);

            if is_open {
                open += 1;
                if debug {
                    let latency = p.get("latency_ms").and_then(Value::as_f64).unwrap_or(0.0);
                    lines.push(format!("{port}/{protocol}: {latency:.2}ms"));
                }
            } else if debug {
                let mut line = format!("{port}/{protocol}: CLOSED");
                if let Some(err) = p.get("error").and_then(Value::as_str) {
                    line = format!("{line} ({err})");
                }
                lines.push(line);
            }
        }

        let summary = format!("{open}/{} open", ports.len());
        if debug && !lines.is_empty() {
            format!("{summary} | {}", lines.join(", "))
        } else {
            summary
        }
    }
}
