//! Status clock: time-driven round promotions.

use anyhow::Result;
use tracing::debug;

use crate::config::EngineConfig;
use crate::store::LotteryStore;

/// Advance round statuses relative to `now`: `open -> closing` inside the
/// pre-close window, then anything past its draw time to `drawn`. Both are
/// batch updates; a tick with nothing due is a no-op. The `drawn -> settled`
/// transition belongs exclusively to the settlement coordinator.
pub async fn advance_round_statuses(
    store: &LotteryStore,
    config: &EngineConfig,
    now: i64,
) -> Result<()> {
    let window_secs = config.close_before_minutes as i64 * 60;
    let closing = store.promote_open_to_closing(now, window_secs).await?;
    let drawn = store.promote_due_to_drawn(now).await?;

    if closing > 0 || drawn > 0 {
        debug!(closing, drawn, "advanced round statuses");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{round_id, Round, RoundStatus};
    use tempfile::NamedTempFile;

    fn create_test_store() -> (LotteryStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = LotteryStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    fn round(seq: u32, draw_at: i64) -> Round {
        Round {
            round_id: round_id("2025-01-20", seq),
            date: "2025-01-20".to_string(),
            seq,
            draw_at,
            result8: "55556666".to_string(),
            status: RoundStatus::Open,
            settling: false,
            settling_at: None,
            settled_at: None,
        }
    }

    fn cfg() -> EngineConfig {
        EngineConfig {
            close_before_minutes: 5,
            ..EngineConfig::default()
        }
    }

    async fn status_of(store: &LotteryStore, seq: u32) -> RoundStatus {
        store
            .get_round(&round_id("2025-01-20", seq))
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn test_open_to_closing_within_window() {
        let (store, _temp) = create_test_store();
        // draws at +2min (inside 5min window), +10min (outside), and -1min (past)
        store
            .create_rounds(
                "2025-01-20",
                &[round(1, 10_120), round(2, 10_600), round(3, 9_940)],
            )
            .await
            .unwrap();

        advance_round_statuses(&store, &cfg(), 10_000).await.unwrap();

        assert_eq!(status_of(&store, 1).await, RoundStatus::Closing);
        assert_eq!(status_of(&store, 2).await, RoundStatus::Open);
        // past draw time goes straight to drawn, not closing
        assert_eq!(status_of(&store, 3).await, RoundStatus::Drawn);
    }

    #[tokio::test]
    async fn test_closing_to_drawn_at_draw_time() {
        let (store, _temp) = create_test_store();
        store.create_rounds("2025-01-20", &[round(1, 10_120)]).await.unwrap();

        advance_round_statuses(&store, &cfg(), 10_000).await.unwrap();
        assert_eq!(status_of(&store, 1).await, RoundStatus::Closing);

        advance_round_statuses(&store, &cfg(), 10_120).await.unwrap();
        assert_eq!(status_of(&store, 1).await, RoundStatus::Drawn);
    }

    #[tokio::test]
    async fn test_tick_is_idempotent_and_never_regresses() {
        let (store, _temp) = create_test_store();
        store.create_rounds("2025-01-20", &[round(1, 10_000)]).await.unwrap();

        for _ in 0..3 {
            advance_round_statuses(&store, &cfg(), 20_000).await.unwrap();
            assert_eq!(status_of(&store, 1).await, RoundStatus::Drawn);
        }
    }

    #[tokio::test]
    async fn test_clock_never_touches_settled_rounds() {
        let (store, _temp) = create_test_store();
        store.create_rounds("2025-01-20", &[round(1, 10_000)]).await.unwrap();
        let rid = round_id("2025-01-20", 1);

        advance_round_statuses(&store, &cfg(), 20_000).await.unwrap();
        assert!(store.try_acquire_settle_lock(&rid, 20_000).await.unwrap());
        store.apply_settlement(&rid, 20_000).await.unwrap();

        advance_round_statuses(&store, &cfg(), 30_000).await.unwrap();
        let r = store.get_round(&rid).await.unwrap().unwrap();
        assert_eq!(r.status, RoundStatus::Settled);
        assert_eq!(r.settled_at, Some(20_000));
    }
}
