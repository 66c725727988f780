//! Lottery worker: 24/7 round lifecycle & settlement loop.
//!
//! Boot order: catch-up sweep first (repair any downtime gaps), then the two
//! scheduler timers run until shutdown.

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lotto_engine::{
    config::EngineConfig, events::EventSink, scheduler::Scheduler, store::LotteryStore,
};

#[derive(Parser, Debug)]
#[command(name = "lotto-worker", about = "Recurring-round lottery settlement worker")]
struct Cli {
    /// SQLite database path
    #[arg(long, env = "LOTTO_DB_PATH")]
    db_path: Option<String>,

    /// Run the catch-up sequence once and exit (cron mode)
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }

    info!(
        db = %config.db_path,
        rounds_per_day = config.rounds_per_day,
        lookback_days = config.lookback_days,
        "lottery worker starting"
    );

    let store = Arc::new(LotteryStore::new(&config.db_path)?);
    let events = EventSink::default();
    let scheduler = Scheduler::new(store, events, config);

    // Repair gaps from downtime before live ticking begins. Per-day errors
    // are already isolated inside the sweep; a store-level failure here is
    // logged and left to the recurring loops to retry.
    if let Err(e) = scheduler.run_catch_up().await {
        error!("boot catch-up failed: {e:#}");
    }

    if cli.once {
        info!("catch-up completed, exiting (--once)");
        return Ok(());
    }

    let handles = scheduler.spawn();

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    handles.abort();
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lotto_engine=info,lotto_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
