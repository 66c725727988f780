//! Number pool generator: collision-free random 8-digit draw numbers, one
//! batch per calendar day.

use anyhow::Result;
use rand::Rng;
use tracing::info;

use crate::config::EngineConfig;
use crate::models::{round_id, DrawNumber, DrawStatus};
use crate::store::LotteryStore;

/// Top up the pool for `date` to the configured count. No-op once the day is
/// full, so repeated calls are safe; a persistence failure mid-batch leaves a
/// shorter pool that the next call resumes from.
pub async fn ensure_daily_pool(
    store: &LotteryStore,
    config: &EngineConfig,
    date: &str,
    now: i64,
) -> Result<()> {
    let existing = store.count_pool(date).await?;
    if existing >= config.rounds_per_day as i64 {
        return Ok(());
    }

    for seq in (existing as u32 + 1)..=config.rounds_per_day {
        let number8 = loop {
            let candidate = random_number8();
            if !store.pool_number_exists(date, &candidate).await? {
                break candidate;
            }
        };

        store
            .insert_pool_entry(&DrawNumber {
                date: date.to_string(),
                seq,
                round_id: round_id(date, seq),
                number8,
                status: DrawStatus::Unused,
                created_at: now,
            })
            .await?;
    }

    info!(date, count = config.rounds_per_day, "pre-generated draw pool");
    Ok(())
}

/// Random 8-digit numeric string, leading zeros preserved.
fn random_number8() -> String {
    format!("{:08}", rand::thread_rng().gen_range(0..100_000_000u32))
}
