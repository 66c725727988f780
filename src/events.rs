//! Outbound event sink.
//!
//! Settlement side effects (wallet updates, result announcements) go out on a
//! broadcast channel after the settlement transaction commits. Delivery is
//! fire-and-forget: a sink with no subscribers never fails settlement.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Targeted at one account: balance changed by a lottery win.
    WalletUpdated {
        user_id: String,
        balance: i64,
        delta: i64,
        round_id: String,
        ticket_id: String,
    },
    /// Broadcast: a round's result is now disclosed and settled.
    ResultAnnounced {
        round_id: String,
        result8: String,
        status: String,
        settled_at: i64,
    },
}

#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Best-effort send; a closed or empty channel is not an error.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_ok() {
        let sink = EventSink::new(8);
        sink.emit(EngineEvent::ResultAnnounced {
            round_id: "2025-01-20-R1".into(),
            result8: "55556666".into(),
            status: "settled".into(),
            settled_at: 0,
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let sink = EventSink::new(8);
        let mut rx = sink.subscribe();
        sink.emit(EngineEvent::WalletUpdated {
            user_id: "u1".into(),
            balance: 300,
            delta: 300,
            round_id: "2025-01-20-R1".into(),
            ticket_id: "t1".into(),
        });
        match rx.recv().await.unwrap() {
            EngineEvent::WalletUpdated { user_id, delta, .. } => {
                assert_eq!(user_id, "u1");
                assert_eq!(delta, 300);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
