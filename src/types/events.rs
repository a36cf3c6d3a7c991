//! Structured events emitted by agents and consumed by the controller
//!
//! Agents print one JSON event per line on stdout; the controller tails pod
//! logs and parses each line back into an [`Event`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Ready,
    TestStart,
    TestResult,
    Complete,
    Error,
}

/// One line of the agent's stdout event stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub node: String,
    /// "host" or "overlay"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// "pass" or "fail" on result events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_id: String,
}

impl Event {
    fn base(event_type: EventType, node: &str, pod: &str, run_id: &str) -> Self {
        Self {
            event_type,
            node: node.to_string(),
            network: None,
            pod: pod.to_string(),
            check: None,
            target: None,
            status: None,
            error: None,
            details: None,
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
        }
    }

    pub fn ready(node: &str, pod: &str, run_id: &str) -> Self {
        Self::base(EventType::Ready, node, pod, run_id)
    }

    pub fn test_start(node: &str, pod: &str, check: &str, target: &str, run_id: &str) -> Self {
        let mut event = Self::base(EventType::TestStart, node, pod, run_id);
        event.check = Some(check.to_string());
        event.target = Some(target.to_string());
        event
    }

    pub fn test_result(
        node: &str,
        pod: &str,
        check: &str,
        target: &str,
        status: &str,
        details: Option<Value>,
        run_id: &str,
    ) -> Self {
        let mut event = Self::base(EventType::TestResult, node, pod, run_id);
        event.check = Some(check.to_string());
        event.target = Some(target.to_string());
        event.status = Some(status.to_string());
        event.details = details;
        event
    }

    pub fn complete(node: &str, pod: &str, summary: Value, run_id: &str) -> Self {
        let mut event = Self::base(EventType::Complete, node, pod, run_id);
        event.details = Some(summary);
        event
    }

    pub fn error(node: &str, pod: &str, message: &str, run_id: &str) -> Self {
        let mut event = Self::base(EventType::Error, node, pod, run_id);
        event.error = Some(message.to_string());
        event
    }

    /// Pod name if present, node name otherwise: the key used by the
    /// aggregator's ready/complete bookkeeping.
    pub fn agent_key(&self) -> &str {
        if self.pod.is_empty() {
            &self.node
        } else {
            &self.pod
        }
    }
}
