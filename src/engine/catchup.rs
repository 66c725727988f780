//! Catch-up orchestrator: replays generation, round creation, and settlement
//! over the lookback window so downtime never leaves gaps.

use anyhow::Result;
use tracing::{error, info};

use crate::clock;
use crate::config::EngineConfig;
use crate::engine::{pool, rounds, settlement};
use crate::events::EventSink;
use crate::store::LotteryStore;

/// Run the three sweeps in dependency order: pools, then rounds, then
/// settlement of everything due. Each day is isolated — one bad day is logged
/// and skipped, never blocking the rest. Safe to run at boot and as a
/// recurring backstop; settlement reuses the per-round lock.
pub async fn run_catch_up(
    store: &LotteryStore,
    events: &EventSink,
    config: &EngineConfig,
    now: i64,
) -> Result<()> {
    let dates = clock::lookback_dates(now, config.lookback_days);
    info!(days = dates.len(), "catch-up sweep starting");

    for date in &dates {
        if let Err(e) = pool::ensure_daily_pool(store, config, date, now).await {
            error!(date = %date, "catch-up pool generation failed: {e:#}");
        }
    }

    for date in &dates {
        if let Err(e) = rounds::ensure_daily_rounds(store, config, date).await {
            error!(date = %date, "catch-up round creation failed: {e:#}");
        }
    }

    let settled = settlement::settle_due_rounds(store, events, now).await?;
    info!(settled, "catch-up sweep completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::status::advance_round_statuses;
    use crate::models::RoundStatus;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (LotteryStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = LotteryStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    #[tokio::test]
    async fn test_catch_up_builds_window_and_settles_past_rounds() {
        let (store, _temp) = create_test_store();
        let events = EventSink::new(16);
        let cfg = EngineConfig {
            rounds_per_day: 3,
            lookback_days: 2,
            ..EngineConfig::default()
        };
        let now = clock::now_ts();

        run_catch_up(&store, &events, &cfg, now).await.unwrap();

        let dates = clock::lookback_dates(now, cfg.lookback_days);
        assert_eq!(dates.len(), 3);
        for date in &dates {
            assert_eq!(store.count_pool(date).await.unwrap(), 3);
            assert_eq!(store.count_rounds(date).await.unwrap(), 3);
        }

        // a status tick then a second sweep settles everything already due
        advance_round_statuses(&store, &cfg, now).await.unwrap();
        run_catch_up(&store, &events, &cfg, now).await.unwrap();

        for date in &dates {
            for round in store.rounds_for_date(date).await.unwrap() {
                if round.draw_at <= now {
                    assert_eq!(round.status, RoundStatus::Settled);
                    assert!(round.settled_at.is_some());
                } else {
                    assert!(round.settled_at.is_none());
                }
            }
        }
    }

    #[tokio::test]
    async fn test_catch_up_is_idempotent() {
        let (store, _temp) = create_test_store();
        let events = EventSink::new(16);
        let cfg = EngineConfig {
            rounds_per_day: 2,
            lookback_days: 1,
            ..EngineConfig::default()
        };
        let now = clock::now_ts();

        run_catch_up(&store, &events, &cfg, now).await.unwrap();
        run_catch_up(&store, &events, &cfg, now).await.unwrap();

        for date in clock::lookback_dates(now, cfg.lookback_days) {
            assert_eq!(store.count_pool(&date).await.unwrap(), 2);
            assert_eq!(store.count_rounds(&date).await.unwrap(), 2);
        }
    }
}
