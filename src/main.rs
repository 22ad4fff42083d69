//! Chorewheel scheduler daemon.
//!
//! Wires the dependency graph once at startup — database, clock, scheduler —
//! and runs the periodic loop until interrupted.

use anyhow::Result;
use chorewheel::clock::SystemClock;
use chorewheel::config::AppConfig;
use chorewheel::db::Database;
use chorewheel::scheduler::Scheduler;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "chorewheel", about = "Household chore scheduler daemon")]
struct Cli {
    /// Path to a YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config file).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Tick interval in milliseconds (overrides config file).
    #[arg(long)]
    tick_interval_ms: Option<u64>,

    /// Log verbosity.
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the flag when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_string()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.db_path = db.display().to_string();
    }
    if let Some(ms) = cli.tick_interval_ms {
        config.tick_interval_ms = ms;
    }

    info!(db = %config.db_path, tick_ms = config.tick_interval_ms, "starting chorewheel");

    let db = Database::open(&config.db_path)?;
    let clock = Arc::new(SystemClock);
    let scheduler = Arc::new(Scheduler::new(db, clock, config.scheduler()));

    let handle = scheduler
        .start()
        .expect("scheduler cannot already be running at startup");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, finishing current tick");
    scheduler.stop();
    handle.await?;

    Ok(())
}
