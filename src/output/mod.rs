//! Output formatting: single results and grouped event tables

use crate::checks::{Check, CHECK_REGISTRY};
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::types::{CheckResult, CheckStatus, Event, EventType};
use owo_colors::OwoColorize;

/// Display order for the grouped event table
const CHECK_ORDER: [&str; 7] = [
    "ping",
    "dns",
    "ports",
    "bandwidth",
    "hostconfig",
    "conntrack",
    "iptables",
];

/// Print a single check result (direct `check` subcommands)
pub fn print_result(result: &CheckResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(result)?);
        }
        OutputFormat::Table => print_result_table(result),
    }
    Ok(())
}

fn print_result_table(result: &CheckResult) {
    let status = match result.status {
        CheckStatus::Fail => "✗".red().to_string(),
        CheckStatus::Incomplete | CheckStatus::Skipped => "?".yellow().to_string(),
        CheckStatus::Pass => "✓".green().to_string(),
    };

    println!("Check:    {}", result.check);
    println!("Target:   {}", result.target);
    println!("Status:   {status} {}", result.status);
    println!("Duration: {:.1}ms", result.duration_ms);

    if let Some(error) = &result.error {
        println!("Error:    {error}");
    }

    if !result.details.is_empty() {
        println!("\nDetails:");
        let details = serde_json::to_string_pretty(&result.details).unwrap_or_default();
        for line in details.lines() {
            println!("  {line}");
        }
    }
}

/// Print a collected event log in the requested format
pub fn print_events(events: &[Event], format: OutputFormat, debug: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(events)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(events)?);
        }
        OutputFormat::Table => print_events_table(events, debug),
    }
    Ok(())
}

/// Minimum column widths for the Node and Target columns over a set of
/// events; short names still get a readable floor.
fn column_widths(events: &[&Event], is_local: bool) -> (usize, usize) {
    const MIN_WIDTH: usize = 6;
    let mut node_width = MIN_WIDTH.max("Node".len());
    let mut target_width = MIN_WIDTH.max(if is_local { 0 } else { "Target".len() });

    for event in events {
        node_width = node_width.max(event.node.len());
        if !is_local {
            if let Some(target) = &event.target {
                target_width = target_width.max(target.len());
            }
        }
    }
    (node_width, target_width)
}

fn status_cell(status: Option<&str>) -> String {
    if status == Some("fail") {
        format!("{:<10}", "✗ FAIL").red().to_string()
    } else {
        format!("{:<10}", "✓ PASS").green().to_string()
    }
}

fn details_cell(event: &Event, debug: bool) -> String {
    let mut details = event
        .check
        .as_deref()
        .and_then(|name| CHECK_REGISTRY.get(name))
        .map(|check| check.format_summary(event.details.as_ref(), debug))
        .unwrap_or_default();

    if let Some(error) = &event.error {
        details = if details.is_empty() {
            error.clone()
        } else {
            format!("{details} | {error}")
        };
    }
    details
}

fn print_events_table(events: &[Event], debug: bool) {
    if events.is_empty() {
        println!("No test results collected.");
        return;
    }

    let mut passed = 0;
    let mut failed = 0;
    let mut errors = 0;
    // Grouped by check name, insertion-ordered
    let mut by_check: Vec<(String, Vec<&Event>)> = Vec::new();

    fn push_event<'a>(by_check: &mut Vec<(String, Vec<&'a Event>)>, check: String, event: &'a Event) {
        match by_check.iter_mut().find(|(name, _)| *name == check) {
            Some((_, events)) => events.push(event),
            None => by_check.push((check, vec![event])),
        }
    }

    for event in events {
        match event.event_type {
            EventType::TestResult => {
                let is_fail = event.status.as_deref() == Some("fail");
                if is_fail {
                    failed += 1;
                } else {
                    passed += 1;
                }

                let check_name = event.check.clone().unwrap_or_default();
                let always_show = CHECK_REGISTRY
                    .get(&check_name)
                    .map(|c| c.always_show())
                    .unwrap_or(false);

                if is_fail || debug || always_show {
                    push_event(&mut by_check, check_name, event);
                }
            }
            EventType::Error => {
                errors += 1;
                push_event(&mut by_check, event.check.clone().unwrap_or_default(), event);
            }
            _ => {}
        }
    }

    // Fixed check order first, then anything unexpected
    let mut ordered: Vec<(String, Vec<&Event>)> = Vec::new();
    for name in CHECK_ORDER {
        if let Some(pos) = by_check.iter().position(|(n, _)| n == name) {
            ordered.push(by_check.remove(pos));
        }
    }
    ordered.append(&mut by_check);

    for (check_name, mut check_events) in ordered {
        if check_events.is_empty() {
            continue;
        }

        let check = CHECK_REGISTRY.get(&check_name);
        let is_local = check.as_ref().map(|c| c.is_local()).unwrap_or(false);

        if check_name == "bandwidth" {
            check_events.sort_by(|a, b| a.node.cmp(&b.node));
        }

        let (node_width, target_width) = column_widths(&check_events, is_local);

        println!("\n{}", check_name.to_uppercase().bold());
        if is_local {
            println!("{}", "-".repeat(node_width + 3 + 10 + 3 + "Details".len()));
            println!("{:<node_width$}   {:<10}   {}", "Node", "Status", "Details");
            for event in check_events {
                println!(
                    "{:<node_width$}   {}   {}",
                    event.node,
                    status_cell(event.status.as_deref()),
                    details_cell(event, debug),
                );
            }
        } else {
            println!(
                "{}",
                "-".repeat(node_width + 3 + target_width + 3 + 10 + 3 + "Details".len())
            );
            println!(
                "{:<node_width$}   {:<target_width$}   {:<10}   {}",
                "Node", "Target", "Status", "Details"
            );
            for event in check_events {
                println!(
                    "{:<node_width$}   {:<target_width$}   {}   {}",
                    event.node,
                    event.target.as_deref().unwrap_or(""),
                    status_cell(event.status.as_deref()),
                    details_cell(event, debug),
                );
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60));
    println!("Summary: {passed} passed, {failed} failed, {errors} errors");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_widths_floor() {
        let event = Event::test_result("n", "p", "ping", "t", "pass", None, "r");
        let (node, target) = column_widths(&[&event], false);
        assert_eq!(node, 6);
        assert_eq!(target, 6);
    }

    #[test]
    fn test_column_widths_grow_with_names() {
        let event = Event::test_result(
            "a-rather-long-node-name",
            "p",
            "ping",
            "an-even-longer-target-name",
            "pass",
            None,
            "r",
        );
        let (node, target) = column_widths(&[&event], false);
        assert_eq!(node, "a-rather-long-node-name".len());
        assert_eq!(target, "an-even-longer-target-name".len());
    }

    #[test]
    fn test_details_cell_appends_error() {
        let mut event = Event::test_result("n", "p", "ports", "t", "fail", None, "r");
        event.error = Some("9999/tcp:web".to_string());
        assert_eq!(details_cell(&event, false), "9999/tcp:web");
    }
}
