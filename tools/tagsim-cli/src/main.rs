//! tagsim - simulated industrial data source
//!
//! Creates the configured tags, runs the update scheduler and diagnostics
//! reporter until Ctrl-C or SIGTERM, then shuts down in order.

use clap::Parser;
use error::{CliError, CliResult};
use std::path::PathBuf;
use tagsim_core::{SimulatorConfig, SimulatorContext};
use tagsim_sync::Simulator;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod error;

/// tagsim - simulated industrial data source with typed, time-varying tags
#[derive(Debug, Parser)]
#[command(name = "tagsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file (defaults apply to every missing field)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence when set)
    #[arg(short, long)]
    debug: bool,

    /// Do not start the diagnostics reporter
    #[arg(long)]
    no_diagnostics: bool,

    /// Override the update interval in milliseconds
    #[arg(long, value_name = "MS")]
    update_interval_ms: Option<u64>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.debug) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!(error = %e, "tagsim exited with an error");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| CliError::Other(anyhow::anyhow!("failed to install log subscriber: {}", e)))
}

fn effective_config(cli: &Cli) -> CliResult<SimulatorConfig> {
    let mut config = match &cli.config {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::default(),
    };

    if cli.no_diagnostics {
        config = config.diagnostics_enabled(false);
    }
    if let Some(ms) = cli.update_interval_ms {
        config = config.update_interval_ms(ms);
    }

    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = effective_config(&cli)?;

    if cli.print_config {
        config.tags = config.tag_specs(chrono::Utc::now());
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let ctx = SimulatorContext::new(config)?;
    print_banner(&ctx);

    let simulator = Simulator::start(ctx)?;

    wait_for_shutdown_signal().await?;
    info!("shutdown signal received");

    let report = simulator.shutdown()?;
    info!(
        tags_destroyed = report.tags_destroyed,
        scheduler_ticks = report.scheduler_ticks,
        "tagsim stopped"
    );
    Ok(())
}

fn print_banner(ctx: &SimulatorContext) {
    let config = ctx.config();
    info!("tagsim {}", env!("CARGO_PKG_VERSION"));
    info!(
        tags = ctx.store().len(),
        max_tags = config.max_tags,
        update_interval_ms = config.update_interval_ms,
        diagnostics = config.diagnostics_enabled,
        diagnostics_interval_ms = config.diagnostics_interval_ms,
        "configuration"
    );

    for (handle, tag) in ctx.store().iter() {
        debug!(
            %handle,
            tag = %tag.key(),
            tag_type = %tag.tag_type(),
            simulation = ?tag.simulation(),
            "registered tag"
        );
    }

    info!("press Ctrl-C to stop");
}

async fn wait_for_shutdown_signal() -> CliResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate()).map_err(CliError::Signal)?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map_err(CliError::Signal)?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.map_err(CliError::Signal)?;

    Ok(())
}
