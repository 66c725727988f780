//! Round factory: turns a day's pre-generated pool into scheduled rounds.

use anyhow::{bail, Result};
use tracing::info;

use crate::clock;
use crate::config::EngineConfig;
use crate::models::{Round, RoundStatus};
use crate::store::LotteryStore;

/// Create the day's rounds from the unused pool, all-or-nothing. The round
/// result is pre-committed here from the pool entry; settlement only
/// discloses it. No-op once the day has its full round count.
///
/// An underfilled pool is a generator invariant violation: fail the whole day
/// rather than create a partial schedule.
pub async fn ensure_daily_rounds(
    store: &LotteryStore,
    config: &EngineConfig,
    date: &str,
) -> Result<()> {
    let existing = store.count_rounds(date).await?;
    if existing >= config.rounds_per_day as i64 {
        return Ok(());
    }

    let draws = store.unused_pool_entries(date).await?;
    let needed = config.rounds_per_day as i64 - existing;
    if (draws.len() as i64) < needed {
        bail!(
            "insufficient pre-generated numbers for {date}: have {}, need {needed}",
            draws.len()
        );
    }

    let mut rounds = Vec::with_capacity(draws.len());
    for draw in &draws {
        rounds.push(Round {
            round_id: draw.round_id.clone(),
            date: date.to_string(),
            seq: draw.seq,
            draw_at: clock::draw_ts(
                date,
                draw.seq,
                config.base_draw_hour,
                config.round_interval_hours,
            )?,
            result8: draw.number8.clone(),
            status: RoundStatus::Open,
            settling: false,
            settling_at: None,
            settled_at: None,
        });
    }

    store.create_rounds(date, &rounds).await?;
    info!(date, count = rounds.len(), "created daily rounds");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pool::ensure_daily_pool;
    use crate::models::{round_id, DrawNumber, DrawStatus};
    use tempfile::NamedTempFile;

    fn create_test_store() -> (LotteryStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = LotteryStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    fn test_config(rounds_per_day: u32) -> EngineConfig {
        EngineConfig {
            rounds_per_day,
            round_interval_hours: 2,
            base_draw_hour: 2,
            ..EngineConfig::default()
        }
    }

    async fn seed_pool(store: &LotteryStore, date: &str, numbers: &[&str]) {
        for (i, n) in numbers.iter().enumerate() {
            store
                .insert_pool_entry(&DrawNumber {
                    date: date.to_string(),
                    seq: i as u32 + 1,
                    round_id: round_id(date, i as u32 + 1),
                    number8: n.to_string(),
                    status: DrawStatus::Unused,
                    created_at: 500,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_rounds_take_pool_numbers_in_order() {
        let (store, _temp) = create_test_store();
        let cfg = test_config(3);
        let date = "2025-01-20";
        seed_pool(&store, date, &["11112222", "33334444", "55556666"]).await;

        ensure_daily_rounds(&store, &cfg, date).await.unwrap();

        let rounds = store.rounds_for_date(date).await.unwrap();
        assert_eq!(rounds.len(), 3);
        assert_eq!(rounds[0].result8, "11112222");
        assert_eq!(rounds[1].result8, "33334444");
        assert_eq!(rounds[2].result8, "55556666");
        assert!(rounds.iter().all(|r| r.status == RoundStatus::Open));

        // fixed interval spacing from the base time
        assert_eq!(rounds[1].draw_at - rounds[0].draw_at, 2 * 3600);
        assert_eq!(rounds[2].draw_at - rounds[1].draw_at, 2 * 3600);

        // consumed pool entries are assigned
        assert!(store.unused_pool_entries(date).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_pool_fails_without_partial_rounds() {
        let (store, _temp) = create_test_store();
        let cfg = test_config(3);
        let date = "2025-01-20";
        seed_pool(&store, date, &["11112222", "33334444"]).await;

        assert!(ensure_daily_rounds(&store, &cfg, date).await.is_err());
        assert_eq!(store.count_rounds(date).await.unwrap(), 0);
        // pool untouched
        assert_eq!(store.unused_pool_entries(date).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_daily_rounds_idempotent() {
        let (store, _temp) = create_test_store();
        let cfg = test_config(4);
        let date = "2025-01-20";
        ensure_daily_pool(&store, &cfg, date, 500).await.unwrap();

        ensure_daily_rounds(&store, &cfg, date).await.unwrap();
        let first = store.rounds_for_date(date).await.unwrap();

        ensure_daily_rounds(&store, &cfg, date).await.unwrap();
        let second = store.rounds_for_date(date).await.unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.round_id, b.round_id);
            assert_eq!(a.result8, b.result8);
            assert_eq!(a.draw_at, b.draw_at);
        }
    }
}
