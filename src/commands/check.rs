//! Direct check command: run one probe locally and print its result

use crate::checks::{
    self, run_with_timeout, BandwidthCheck, Check, ConntrackCheck, DnsCheck, HostConfigCheck,
    IptablesCheck, PingCheck, PortsCheck, BANDWIDTH_DURATION, BANDWIDTH_SHORT_DURATION,
};
use crate::cli::{CheckArgs, CheckCommand, OutputFormat};
use crate::error::Result;
use crate::output;
use crate::types::parse_port_spec;
use tokio_util::sync::CancellationToken;

pub async fn run_check(args: &CheckArgs, format: OutputFormat) -> Result<()> {
    let cancel = CancellationToken::new();

    match &args.command {
        CheckCommand::Dns { names, server } => {
            let check = DnsCheck::new(names.clone(), server.clone());
            let result =
                run_with_timeout(&check, &cancel, "dns-test", checks::DEFAULT_CHECK_TIMEOUT).await;
            output::print_result(&result, format)?;
        }

        CheckCommand::Ping { targets, count } => {
            let check = PingCheck::new(*count);
            let timeout = check.timeout();
            for target in targets {
                let result = run_with_timeout(&check, &cancel, target, timeout).await;
                output::print_result(&result, format)?;
                println!();
            }
        }

        CheckCommand::Ports { targets, ports } => {
            let specs = ports
                .iter()
                .map(|s| parse_port_spec(s))
                .collect::<Result<Vec<_>>>()?;
            let check = PortsCheck::new(specs);
            for target in targets {
                let result =
                    run_with_timeout(&check, &cancel, target, checks::DEFAULT_PORTS_TIMEOUT).await;
                output::print_result(&result, format)?;
                println!();
            }
        }

        CheckCommand::Bandwidth { target, short } => {
            let duration = if *short {
                BANDWIDTH_SHORT_DURATION
            } else {
                BANDWIDTH_DURATION
            };
            let check = BandwidthCheck::new(duration);
            let timeout = check.timeout();
            let result = run_with_timeout(&check, &cancel, target, timeout).await;
            output::print_result(&result, format)?;
        }

        CheckCommand::Hostconfig => {
            run_local(&HostConfigCheck, &cancel, format).await?;
        }
        CheckCommand::Conntrack => {
            run_local(&ConntrackCheck, &cancel, format).await?;
        }
        CheckCommand::Iptables => {
            run_local(&IptablesCheck, &cancel, format).await?;
        }
    }

    Ok(())
}

async fn run_local(
    check: &dyn Check,
    cancel: &CancellationToken,
    format: OutputFormat,
) -> Result<()> {
    let result = run_with_timeout(check, cancel, "localhost", checks::DEFAULT_CHECK_TIMEOUT).await;
    output::print_result(&result, format)
}
