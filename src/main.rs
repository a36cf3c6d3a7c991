//! netprobe - coordinated network diagnostics for Kubernetes clusters

use anyhow::Result;
use clap::Parser;
use netprobe::cli::{Cli, Command};
use netprobe::commands;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let result = match cli.command {
        Command::Run(ref args) => {
            commands::run_tests(
                cli.context.as_deref(),
                &cli.namespace,
                args,
                cli.output,
                cli.debug,
            )
            .await
        }
        Command::Check(ref args) => commands::run_check(args, cli.output).await,
        Command::Agent(ref args) => commands::run_agent(args).await,
        Command::Deploy(ref args) => {
            commands::run_deploy(cli.context.as_deref(), &cli.namespace, args).await
        }
        Command::Version => {
            commands::run_version();
            Ok(())
        }
        Command::Completions(ref args) => {
            generate_completions(args.shell);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}

/// Tracing goes to stderr: the agent's stdout is a JSON event stream and must
/// stay clean.
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "netprobe", &mut std::io::stdout());
}
