use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use amtlog_core::config::AmtlogConfig;
use amtlog_daemon::cli::DaemonCli;
use amtlog_daemon::logging;
use amtlog_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DaemonCli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The subscriber may not be installed yet (config errors).
            eprintln!("amtlog-daemon: {e:#}");
            tracing::error!(error = %format!("{e:#}"), "amtlog-daemon exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: DaemonCli) -> Result<()> {
    let mut config = AmtlogConfig::from_file(&cli.config)
        .await
        .with_context(|| format!("failed to read {}", cli.config.display()))?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "amtlog-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    let reason = orchestrator.run().await?;
    tracing::info!(reason = ?reason, "amtlog-daemon shut down");
    Ok(())
}
