use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use virtual_farm::{
    clock::SystemClock,
    driver,
    storage::open_store,
    web::{self, WebServerConfig},
    PersistOutcome, SimConfig, SimulationController,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Virtual farm simulation engine")]
struct Cli {
    /// Path to the farm config YAML file (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the RNG seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Directory for persisted state (kept in memory when omitted)
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the farm and run a fixed number of ticks as fast as possible
    Run {
        #[arg(long, default_value_t = 1_000)]
        ticks: u64,
    },
    /// Drive the farm in real time and serve it over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = Some(dir);
    }

    let store = open_store(config.storage_dir.as_deref()).context("failed to open state store")?;
    let tick_period = Duration::from_millis(config.timing.tick_interval_ms);
    let mut controller = SimulationController::attach(config, store, Arc::new(SystemClock));

    match cli.command {
        Command::Run { ticks } => {
            controller.start();
            let mut onsets = 0;
            for _ in 0..ticks {
                if let Some(summary) = controller.tick() {
                    if summary.rain_onset.is_some() {
                        onsets += 1;
                    }
                    if let PersistOutcome::Deferred(reason) = &summary.persistence {
                        warn!(tick = summary.tick, %reason, "state write deferred");
                    }
                }
            }
            let state = controller.state();
            info!(ticks, onsets, "run complete");
            println!(
                "Farm '{}' ran {} ticks: day {:.2}, growth {:.1}%, moisture {:.1}%, nutrients {:.1}%, quality {:.1}, value NGN {:.0}, rain onsets {}",
                controller.config().name,
                ticks,
                state.day,
                state.growth,
                state.moisture,
                state.nutrients,
                state.yield_quality,
                controller.market_value(),
                onsets
            );
        }
        Command::Serve { host, port } => {
            web::run(WebServerConfig {
                controller: driver::share(controller),
                tick_period,
                host,
                port,
            })
            .await?;
        }
    }
    Ok(())
}
