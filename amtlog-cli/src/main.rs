use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use amtlog_cli::cli::{Cli, Commands};
use amtlog_cli::commands;
use amtlog_cli::error::CliError;
use amtlog_cli::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Diagnostics go to stderr so that `--output json` stays machine-readable.
    let filter = cli.log_level.as_deref().unwrap_or("warn");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::Rules(args) => commands::rules::execute(args, &cli.config, &writer).await,
        Commands::Parse(args) => commands::parse::execute(args, &cli.config, &writer).await,
        Commands::Ledger(args) => commands::ledger::execute(args, &cli.config, &writer).await,
    }
}
