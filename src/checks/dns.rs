//! Name resolution check
//!
//! Resolves a list of names through the system resolver, or through an
//! explicit server over UDP port 53 when one is configured.

use crate::checks::Check;
use crate::error::Result;
use crate::types::{CheckResult, CheckStatus, DnsLookupDetails};
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, Protocol as DnsProtocol, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Names resolved when none are configured
pub const DEFAULT_DNS_NAMES: [&str; 2] = ["kubernetes.default.svc.cluster.local", "google.com"];

pub struct DnsCheck {
    pub names: Vec<String>,
    pub server: Option<String>,
}

impl DnsCheck {
    pub fn new(names: Vec<String>, server: Option<String>) -> Self {
        let names = if names.is_empty() {
            DEFAULT_DNS_NAMES.iter().map(|s| s.to_string()).collect()
        } else {
            names
        };
        Self { names, server }
    }

    async fn resolve_with_timing(&self, name: &str) -> (DnsLookupDetails, Option<String>) {
        let mut details = DnsLookupDetails {
            server: self
                .server
                .clone()
                .unwrap_or_else(|| "system-default".to_string()),
            query: name.to_string(),
            ..Default::default()
        };

        let start = Instant::now();
        let outcome = match &self.server {
            Some(server) => self.resolve_via_server(name, server).await,
            None => resolve_system(name).await,
        };
        details.latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(ips) => {
                details.resolved_ips = ips;
                (details, None)
            }
            Err(e) => (details, Some(e)),
        }
    }

    async fn resolve_via_server(
        &self,
        name: &str,
        server: &str,
    ) -> std::result::Result<Vec<String>, String> {
        let addr: SocketAddr = format!("{server}:53")
            .parse()
            .map_err(|e| format!("invalid DNS server {server}: {e}"))?;

        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(addr, DnsProtocol::Udp));
        let resolver = TokioAsyncResolver::tokio(config, ResolverOpts::default());

        let lookup = resolver.lookup_ip(name).await.map_err(|e| e.to_string())?;
        Ok(lookup.iter().map(|ip| ip.to_string()).collect())
    }
}

/// Resolve through the system resolver
async fn resolve_system(name: &str) -> std::result::Result<Vec<String>, String> {
    let addrs = tokio::net::lookup_host((name, 0u16))
        .await
        .map_err(|e| e.to_string())?;

    let mut ips: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
    ips.dedup();
    if ips.is_empty() {
        return Err("no addresses returned".to_string());
    }
    Ok(ips)
}

impl Default for DnsCheck {
    fn default() -> Self {
        Self::new(Vec::new(), None)
    }
}

#[async_trait]
impl Check for DnsCheck {
    fn name(&self) -> &'static str {
        "dns"
    }

    async fn run(&self, _cancel: &CancellationToken, target: &str) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.name(), target);

        let mut lookups = Vec::new();
        let mut errors = Vec::new();

        for name in &self.names {
            let (details, err) = self.resolve_with_timing(name).await;
            if let Some(err) = err {
                errors.push(format!("{name}: {err}"));
                result.status = CheckStatus::Fail;
            }
            lookups.push(details);
        }

        result
            .details
            .insert("lookups".to_string(), json!(lookups));

        if !errors.is_empty() {
            result.details.insert("errors".to_string(), json!(errors));
            result.error = Some(errors.join("; "));
        }

        Ok(result)
    }

    fn format_summary(&self, details: Option<&Value>, debug: bool) -> String {
        let Some(lookups) = details.and_then(|d| d.get("lookups")).and_then(Value::as_array)
        else {
            return String::new();
        };

        if lookups.is_empty() {
            return String::new();
        }

        let mut ok = 0;
        let mut lines = Vec::new();

        for lookup in lookups {
            let query = lookup.get("query").and_then(Value::as_str).unwrap_or("");
            let ips: Vec<&str> = lookup
                .get("resolved_ips")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let latency = lookup
                .get("latency_ms")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);

            if !ips.is_empty() {
                ok += 1;
                if debug {
                    lines.push(format!("{query}: [{}] ({latency:.2}ms)", ips.join(", ")));
                }
            } else if debug {
                lines.push(format!("{query}: failed"));
            }
        }

        let summary = format!("{ok}/{} lookups OK", lookups.len());
        if debug && !lines.is_empty() {
            format!("{summary} | {}", lines.join(", "))
        } else {
            summary
        }
    }
}

/// Strip names under the cluster-internal DNS zone; those can only resolve
/// from the overlay network.
pub fn filter_cluster_local_names(names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter(|n| !n.ends_with(".cluster.local"))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_applied() {
        let check = DnsCheck::default();
        assert_eq!(check.names.len(), 2);
        assert_eq!(check.names[0], "kubernetes.default.svc.cluster.local");
    }

    #[test]
    fn test_filter_cluster_local_names() {
        let names = vec![
            "kubernetes.default.svc.cluster.local".to_string(),
            "google.com".to_string(),
        ];
        let filtered = filter_cluster_local_names(&names);
        assert_eq!(filtered, vec!["google.com".to_string()]);
    }

    #[test]
    fn test_format_summary_counts_successes() {
        let check = DnsCheck::default();
        let details = json!({
            "lookups": [
                {"query": "a.example", "resolved_ips": ["1.1.1.1"], "latency_ms": 2.0},
                {"query": "b.example", "latency_ms": 5.0},
            ]
        });

        assert_eq!(check.format_summary(Some(&details), false), "1/2 lookups OK");

        let debug = check.format_summary(Some(&details), true);
        assert!(debug.contains("a.example: [1.1.1.1]"));
        assert!(debug.contains("b.example: failed"));
    }

    #[test]
    fn test_format_summary_empty_details() {
        let check = DnsCheck::default();
        assert_eq!(check.format_summary(None, false), "");
        assert_eq!(check.format_summary(Some(&json!({})), true), "");
    }

    #[tokio::test]
    async fn test_unresolvable_name_fails_with_joined_errors() {
        let check = DnsCheck::new(
            vec!["definitely-not-a-real-host.invalid".to_string()],
            None,
        );
        let cancel = CancellationToken::new();
        let result = check.run(&cancel, "dns-test").await.unwrap();

        assert_eq!(result.status, CheckStatus::Fail);
        let error = result.error.unwrap();
        assert!(error.starts_with("definitely-not-a-real-host.invalid: "));
        assert!(result.details.contains_key("errors"));
    }
}
