//! Domain records for the lottery engine.
//!
//! Field sets mirror the persisted row shapes in `store.rs`. All money amounts
//! are fixed-point `i64` in the smallest currency unit; timestamps are unix
//! epoch seconds.

use serde::{Deserialize, Serialize};

/// Round lifecycle status.
///
/// `Pending` exists for model compatibility but is never produced: rounds are
/// created directly as `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Pending,
    Open,
    Closing,
    Drawn,
    Settled,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Open => "open",
            RoundStatus::Closing => "closing",
            RoundStatus::Drawn => "drawn",
            RoundStatus::Settled => "settled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RoundStatus::Pending),
            "open" => Some(RoundStatus::Open),
            "closing" => Some(RoundStatus::Closing),
            "drawn" => Some(RoundStatus::Drawn),
            "settled" => Some(RoundStatus::Settled),
            _ => None,
        }
    }
}

/// Pool entry status: generated but unconsumed, or already bound to a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    Unused,
    Assigned,
}

impl DrawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawStatus::Unused => "unused",
            DrawStatus::Assigned => "assigned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unused" => Some(DrawStatus::Unused),
            "assigned" => Some(DrawStatus::Assigned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    Won,
    Lost,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Won => "won",
            TicketStatus::Lost => "lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TicketStatus::Pending),
            "won" => Some(TicketStatus::Won),
            "lost" => Some(TicketStatus::Lost),
            _ => None,
        }
    }
}

/// Human-readable round id, e.g. `2025-01-20-R3`.
pub fn round_id(date: &str, seq: u32) -> String {
    format!("{date}-R{seq}")
}

/// Potential payout for an entry, fixed at purchase time: stake plus
/// `percent`% profit, floored to the smallest currency unit.
pub fn potential_payout(stake: i64, percent: i64) -> i64 {
    stake * (100 + percent) / 100
}

/// A pre-generated draw number. One per (date, seq); the 8-digit value is
/// unique within its date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawNumber {
    pub date: String,
    pub seq: u32,
    pub round_id: String,
    pub number8: String,
    pub status: DrawStatus,
    pub created_at: i64,
}

/// A scheduled betting round. The result is pre-committed at creation from
/// the draw pool; `settled_at` is the authoritative completion marker and the
/// `settling` flag is the cross-process settlement lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub round_id: String,
    pub date: String,
    pub seq: u32,
    pub draw_at: i64,
    pub result8: String,
    pub status: RoundStatus,
    pub settling: bool,
    pub settling_at: Option<i64>,
    pub settled_at: Option<i64>,
}

/// One number-and-stake pick within a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketEntry {
    /// 2, 3, 4 or 8: how many trailing digits of the result this entry wagers on.
    pub digit_count: u32,
    pub numbers: String,
    pub stake: i64,
    pub applied_percent: i64,
    pub potential_payout: i64,
}

impl TicketEntry {
    /// An entry wins iff its numbers equal, as a string, the last
    /// `digit_count` characters of the round result. Leading zeros matter.
    pub fn matches(&self, result8: &str) -> bool {
        self.numbers.len() == self.digit_count as usize
            && result8.len() >= self.numbers.len()
            && result8.ends_with(self.numbers.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub user_id: String,
    pub round_id: String,
    pub entries: Vec<TicketEntry>,
    pub total_stake: i64,
    pub total_payout: i64,
    pub status: TicketStatus,
    pub settled_at: Option<i64>,
    pub created_at: i64,
}

impl Ticket {
    /// Sum of precomputed potential payouts over matching entries. Settlement
    /// never recomputes percentages; it only discloses what was promised at
    /// purchase time.
    pub fn payout_for(&self, result8: &str) -> i64 {
        self.entries
            .iter()
            .filter(|e| e.matches(result8))
            .map(|e| e.potential_payout)
            .sum()
    }
}

/// Append-only record of a balance-affecting event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub round_id: Option<String>,
    pub ticket_id: Option<String>,
    pub created_at: i64,
}

/// Per-round settlement aggregate, written inside the settlement transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub round_id: String,
    pub total_tickets: i64,
    pub total_staked: i64,
    pub total_payout: i64,
    pub processed_at: i64,
}
