//! rconctl binary entrypoint.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rcon_supervisor::Console;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rcon_cli::cli::{Cli, Commands};
use rcon_cli::commands::{ExecCommand, InitConfigCommand, ShellCommand, StatusCommand};
use rcon_cli::output::OutputFormat;
use rcon_cli::{settings, DEFAULT_LOG_FILTER};

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    if let Commands::InitConfig(args) = &cli.command {
        InitConfigCommand::new(args.output.clone(), args.force)
            .execute(&mut stdout)
            .context("failed to write configuration")?;
        return Ok(());
    }

    let config = settings::resolve(&cli).context("failed to load configuration")?;
    let console = Console::start(
        config.connector(),
        config.endpoint(),
        config.supervisor_config(),
    )
    .with_default_timeout(config.command_timeout());

    let result = match cli.command {
        Commands::Exec(args) => {
            let timeout = args
                .timeout_secs
                .map_or(config.command_timeout(), Duration::from_secs);
            ExecCommand::new(args.command_line(), timeout)
                .execute(&console, &mut stdout, &format)
                .await
                .with_context(|| format!("failed to execute '{}'", args.command_line()))
        }
        Commands::Shell(args) => {
            let timeout = args
                .timeout_secs
                .map_or(config.command_timeout(), Duration::from_secs);
            let input = BufReader::new(tokio::io::stdin());
            ShellCommand::new(timeout)
                .execute(&console, input, &mut stdout, &format)
                .await
                .map(|summary| {
                    info!(
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        "shell session ended"
                    );
                })
                .context("shell session failed")
        }
        Commands::Status(args) => StatusCommand::new(Duration::from_secs(args.wait_secs))
            .execute(&console, &mut stdout, &format)
            .await
            .with_context(|| format!("console at {} is not ready", config.endpoint().address())),
        Commands::InitConfig(_) => Ok(()),
    };

    console.shutdown().await;
    result
}
