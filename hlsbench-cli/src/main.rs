//! hlsbench CLI - Command-line interface
//!
//! Ramps up simulated HLS viewers against a server and waits for all of
//! them to finish. Viewer failures are printed and never change the exit
//! status; configuration and setup failures exit non-zero.

mod args;

use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use hlsbench_core::config::BenchmarkConfig;
use hlsbench_core::tracing_setup::init_tracing_with_fallback;
use hlsbench_core::{BenchmarkError, ConsoleReporter, Orchestrator, ShutdownTrigger};
use hlsbench_sim::{OriginBehavior, SimulatedOrigin};

use crate::args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing_with_fallback(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))?;

    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let origin = if cli.simulate {
        let origin = SimulatedOrigin::spawn(&cli.stream, OriginBehavior::default())
            .await
            .context("failed to start simulated origin")?;
        println!("Simulated origin listening on {}", origin.base_url());
        Some(origin)
    } else {
        None
    };

    let base_url = origin
        .as_ref()
        .map_or_else(|| cli.url.clone(), |origin| origin.base_url());
    let config = cli.to_config(base_url);
    print_banner(&config);

    let orchestrator =
        Orchestrator::over_http(config, Arc::new(ConsoleReporter)).map_err(setup_failure)?;
    watch_for_interrupt(orchestrator.shutdown_trigger());

    let summary = orchestrator.run().await;
    tracing::info!(
        run_id = %summary.run_id,
        viewers = summary.viewers,
        failed = summary.failed(),
        "Run finished"
    );

    if let Some(origin) = origin {
        origin.shutdown().await;
    }

    Ok(())
}

/// Configuration mistakes point the user at their flags; anything else is
/// an environment problem.
fn setup_failure(error: BenchmarkError) -> anyhow::Error {
    if error.is_user_error() {
        anyhow::Error::new(error).context("invalid benchmark configuration, check the flags")
    } else {
        anyhow::Error::new(error).context("failed to set up benchmark")
    }
}

fn print_banner(config: &BenchmarkConfig) {
    println!("Benchmarking stream: {}", config.target.stream);
    println!("Server: {}", config.target.base_url);
    println!("Viewers: {}", config.viewer_count);
    println!("Duration: {} seconds", config.duration.as_secs());
}

fn watch_for_interrupt(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping viewers");
            trigger.trigger();
        }
    });
}
