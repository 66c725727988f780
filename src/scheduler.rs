//! Scheduler loop: two independent fixed-interval timers driving the status
//! clock and the due-round settlement sweep.
//!
//! The timers share no lock; overlapping ticks (and a concurrent catch-up
//! sweep) are safe because every settlement path goes through the per-round
//! settling lock in the store. Errors are logged per tick and the loops keep
//! running.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::clock;
use crate::config::EngineConfig;
use crate::engine::{catchup, settlement, status};
use crate::events::EventSink;
use crate::store::LotteryStore;

pub struct Scheduler {
    store: Arc<LotteryStore>,
    events: EventSink,
    config: EngineConfig,
}

/// Handles for the spawned timer tasks, kept so shutdown can abort them.
pub struct SchedulerHandles {
    pub status: JoinHandle<()>,
    pub settlement: JoinHandle<()>,
}

impl SchedulerHandles {
    pub fn abort(&self) {
        self.status.abort();
        self.settlement.abort();
    }
}

impl Scheduler {
    pub fn new(store: Arc<LotteryStore>, events: EventSink, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            events,
            config,
        })
    }

    /// Launch both timer loops. They run until aborted.
    pub fn spawn(self: &Arc<Self>) -> SchedulerHandles {
        let status = {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker =
                    interval(Duration::from_secs(scheduler.config.status_tick_secs));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.tick_status().await {
                        warn!("status tick failed: {e:#}");
                    }
                }
            })
        };

        let settlement = {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker =
                    interval(Duration::from_secs(scheduler.config.settle_tick_secs));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.tick_settlement().await {
                        warn!("settlement tick failed: {e:#}");
                    }
                }
            })
        };

        info!(
            status_secs = self.config.status_tick_secs,
            settle_secs = self.config.settle_tick_secs,
            "scheduler started"
        );
        SchedulerHandles { status, settlement }
    }

    /// One status-clock tick at the current wall time. Also usable directly
    /// from a request handler or a test.
    pub async fn tick_status(&self) -> Result<()> {
        status::advance_round_statuses(&self.store, &self.config, clock::now_ts()).await
    }

    /// One due-round settlement sweep at the current wall time.
    pub async fn tick_settlement(&self) -> Result<usize> {
        settlement::settle_due_rounds(&self.store, &self.events, clock::now_ts()).await
    }

    /// The boot-time (or backstop) catch-up sequence.
    pub async fn run_catch_up(&self) -> Result<()> {
        catchup::run_catch_up(&self.store, &self.events, &self.config, clock::now_ts()).await
    }
}
