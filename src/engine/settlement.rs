//! Settlement coordinator.
//!
//! All payout-mutating paths (scheduler tick, catch-up sweep, any manual
//! re-trigger) funnel through [`settle_round`], which serializes on the
//! round's settling flag in the store. A lost lock race is a no-op, not an
//! error.

use anyhow::Result;
use tracing::{error, info};

use crate::events::{EngineEvent, EventSink};
use crate::models::RoundStatus;
use crate::store::LotteryStore;

/// Settle one round. Returns `Ok(true)` if this call performed the
/// settlement, `Ok(false)` if the round was not eligible (not drawn yet,
/// already settling, or already settled).
///
/// On failure the transaction has rolled back; the settling flag is cleared
/// in a separate best-effort write so the next tick retries.
pub async fn settle_round(
    store: &LotteryStore,
    events: &EventSink,
    round_id: &str,
    now: i64,
) -> Result<bool> {
    if !store.try_acquire_settle_lock(round_id, now).await? {
        return Ok(false);
    }

    let outcome = match store.apply_settlement(round_id, now).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Err(unlock_err) = store.clear_settle_lock(round_id).await {
                error!(
                    round_id,
                    "failed to clear settling flag after abort: {unlock_err:#}"
                );
            }
            error!(round_id, "settlement failed, will retry: {e:#}");
            return Err(e);
        }
    };

    // Post-commit side effects, fire-and-forget.
    for credit in &outcome.credits {
        events.emit(EngineEvent::WalletUpdated {
            user_id: credit.user_id.clone(),
            balance: credit.balance_after,
            delta: credit.payout,
            round_id: outcome.round_id.clone(),
            ticket_id: credit.ticket_id.clone(),
        });
    }
    events.emit(EngineEvent::ResultAnnounced {
        round_id: outcome.round_id.clone(),
        result8: outcome.result8.clone(),
        status: RoundStatus::Settled.as_str().to_string(),
        settled_at: outcome.settled_at,
    });

    info!(
        round_id,
        tickets = outcome.summary.total_tickets,
        payout = outcome.summary.total_payout,
        "round settled"
    );
    Ok(true)
}

/// Settle every round whose draw time has passed and that has no settled
/// marker yet, oldest first. One failing round never blocks the rest.
pub async fn settle_due_rounds(
    store: &LotteryStore,
    events: &EventSink,
    now: i64,
) -> Result<usize> {
    let due = store.due_round_ids(now).await?;
    let mut settled = 0;
    for round_id in &due {
        match settle_round(store, events, round_id, now).await {
            Ok(true) => settled += 1,
            Ok(false) => {}
            // already logged inside settle_round
            Err(_) => {}
        }
    }
    Ok(settled)
}
