//! Check engine: the probe contract, the global registry, and the timeout
//! wrapper every invocation goes through.

pub mod bandwidth;
pub mod conntrack;
pub mod dns;
pub mod hostconfig;
pub mod iptables;
pub mod ping;
pub mod ports;
pub(crate) mod procfs;

pub use bandwidth::{BandwidthCheck, BANDWIDTH_DURATION, BANDWIDTH_SHORT_DURATION};
pub use conntrack::ConntrackCheck;
pub use dns::DnsCheck;
pub use hostconfig::HostConfigCheck;
pub use iptables::IptablesCheck;
pub use ping::PingCheck;
pub use ports::PortsCheck;

use crate::error::Result;
use crate::types::CheckResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default timeout for most checks
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for port checks
pub const DEFAULT_PORTS_TIMEOUT: Duration = Duration::from_secs(10);

/// One diagnostic probe.
///
/// Implementations must return a result even on failure: transport errors
/// become `status=fail` with a human error string. Only the wrapper turns an
/// `Err` or an expired deadline into a failed result.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, cancel: &CancellationToken, target: &str) -> Result<CheckResult>;

    /// True for host-scoped checks whose target is meaningless; these run
    /// once with target "localhost" and render without a Target column.
    fn is_local(&self) -> bool {
        false
    }

    /// True if the check should always appear in rendered output, even when
    /// passing. The measured value is the point for these.
    fn always_show(&self) -> bool {
        false
    }

    /// One display line for the Details column, built from a result event's
    /// details payload.
    fn format_summary(&self, details: Option<&Value>, debug: bool) -> String;
}

/// Global check registry, populated once at first use
pub static CHECK_REGISTRY: LazyLock<CheckRegistry> = LazyLock::new(CheckRegistry::with_defaults);

/// Mapping of check names to instances, safe for concurrent reads
pub struct CheckRegistry {
    checks: RwLock<HashMap<String, Arc<dyn Check>>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self {
            checks: RwLock::new(HashMap::new()),
        }
    }

    fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(DnsCheck::default()));
        registry.register(Arc::new(PingCheck::default()));
        registry.register(Arc::new(PortsCheck::default()));
        registry.register(Arc::new(BandwidthCheck::default()));
        registry.register(Arc::new(HostConfigCheck));
        registry.register(Arc::new(ConntrackCheck));
        registry.register(Arc::new(IptablesCheck));
        registry
    }

    /// Add a check, replacing any existing check of the same name
    pub fn register(&self, check: Arc<dyn Check>) {
        self.checks
            .write()
            .expect("check registry lock poisoned")
            .insert(check.name().to_string(), check);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Check>> {
        self.checks
            .read()
            .expect("check registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Sorted list of registered check names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .checks
            .read()
            .expect("check registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a check under a bounded cancellation scope.
///
/// Records start/end timestamps and duration on the result. A deadline expiry
/// becomes `status=fail` with "timeout after <d>"; cancellation of the outer
/// scope becomes `status=fail` with "cancelled". A check that returns no
/// usable result gets one synthesized with the timing fields.
pub async fn run_with_timeout(
    check: &dyn Check,
    cancel: &CancellationToken,
    target: &str,
    timeout: Duration,
) -> CheckResult {
    let start = chrono::Utc::now();

    let outcome = tokio::select! {
        _ = cancel.cancelled() => None,
        run = tokio::time::timeout(timeout, check.run(cancel, target)) => Some(run),
    };

    let end = chrono::Utc::now();

    let mut result = match outcome {
        Some(Ok(Ok(result))) => result,
        Some(Ok(Err(e))) => CheckResult::new(check.name(), target).fail(e.to_string()),
        Some(Err(_elapsed)) => {
            let timeout_str = humantime::format_duration(timeout).to_string();
            CheckResult::new(check.name(), target).fail(format!("timeout after {timeout_str}"))
        }
        None => CheckResult::new(check.name(), target).fail("cancelled"),
    };

    result.start_time = start;
    result.end_time = end;
    result.duration_ms = (end - start).num_microseconds().unwrap_or(0) as f64 / 1000.0;
    result
}
