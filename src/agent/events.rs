//! Event emission: one JSON object per line on stdout
//!
//! The controller tails this stream through the pod log API, so every write
//! is flushed immediately.

use crate::agent::AgentInfo;
use crate::error::Result;
use crate::types::{CheckResult, CheckStatus, Event};
use serde_json::Value;
use std::io::Write;

pub fn emit(event: &Event) -> Result<()> {
    let line = serde_json::to_string(event)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

pub fn emit_ready(info: &AgentInfo, run_id: &str) -> Result<()> {
    emit(&Event::ready(&info.node_name, &info.pod_name, run_id))
}

pub fn emit_test_start(info: &AgentInfo, check: &str, target: &str, run_id: &str) -> Result<()> {
    emit(&Event::test_start(
        &info.node_name,
        &info.pod_name,
        check,
        target,
        run_id,
    ))
}

pub fn emit_test_result(info: &AgentInfo, result: &CheckResult, run_id: &str) -> Result<()> {
    let status = match result.status {
        CheckStatus::Fail => "fail",
        _ => "pass",
    };

    let details = if result.details.is_empty() {
        None
    } else {
        Some(Value::Object(result.details.clone()))
    };

    let mut event = Event::test_result(
        &info.node_name,
        &info.pod_name,
        &result.check,
        &result.target,
        status,
        details,
        run_id,
    );
    event.error = result.error.clone();

    emit(&event)
}

pub fn emit_complete(info: &AgentInfo, run_id: &str, summary: Value) -> Result<()> {
    emit(&Event::complete(
        &info.node_name,
        &info.pod_name,
        summary,
        run_id,
    ))
}

pub fn emit_error(info: &AgentInfo, run_id: &str, message: &str) -> Result<()> {
    emit(&Event::error(
        &info.node_name,
        &info.pod_name,
        message,
        run_id,
    ))
}
