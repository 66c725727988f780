//! SQLite-backed lottery store.
//!
//! All persistence lives here: schema with the unique compound indexes the
//! engine relies on, the batch status promotions, the settlement transaction,
//! and the conditional-UPDATE settling lock. The connection sits behind a
//! tokio mutex; cross-process exclusion never depends on it — the settling
//! flag in the `rounds` table is the only settlement lock.

use anyhow::{bail, Context, Result};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    DrawNumber, DrawStatus, LedgerEntry, Round, RoundStatus, SettlementSummary, Ticket,
    TicketStatus,
};

/// One wallet credit performed during settlement, reported back for event
/// emission after commit.
#[derive(Debug, Clone)]
pub struct WalletCredit {
    pub user_id: String,
    pub ticket_id: String,
    pub payout: i64,
    pub balance_after: i64,
}

/// Result of a committed settlement transaction.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub round_id: String,
    pub result8: String,
    pub settled_at: i64,
    pub credits: Vec<WalletCredit>,
    pub summary: SettlementSummary,
}

#[derive(Clone)]
pub struct LotteryStore {
    conn: Arc<Mutex<Connection>>,
}

impl LotteryStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open lottery db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON").ok();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS draw_pool (
                date TEXT NOT NULL,
                seq INTEGER NOT NULL,
                round_id TEXT NOT NULL UNIQUE,
                number8 TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'unused',
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        // One entry per slot, and no duplicate numbers within a day.
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_draw_pool_date_seq ON draw_pool(date, seq)",
            [],
        )?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_draw_pool_date_number ON draw_pool(date, number8)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS rounds (
                round_id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                seq INTEGER NOT NULL,
                draw_at INTEGER NOT NULL,
                result8 TEXT NOT NULL,
                status TEXT NOT NULL,
                settling INTEGER NOT NULL DEFAULT 0,
                settling_at INTEGER,
                settled_at INTEGER
            )",
            [],
        )?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_rounds_date_seq ON rounds(date, seq)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_rounds_status_draw_at ON rounds(status, draw_at)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_rounds_settled_draw_at ON rounds(settled_at, draw_at)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                balance INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tickets (
                ticket_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                round_id TEXT NOT NULL,
                entries TEXT NOT NULL,
                total_stake INTEGER NOT NULL,
                total_payout INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                settled_at INTEGER,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(user_id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tickets_round_status ON tickets(round_id, status)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                amount INTEGER NOT NULL,
                balance_before INTEGER NOT NULL,
                balance_after INTEGER NOT NULL,
                round_id TEXT,
                ticket_id TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(user_id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_ledger_user_created ON ledger(user_id, created_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS settlement_summaries (
                round_id TEXT PRIMARY KEY,
                total_tickets INTEGER NOT NULL,
                total_staked INTEGER NOT NULL,
                total_payout INTEGER NOT NULL,
                processed_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ---------- draw pool ----------

    pub async fn count_pool(&self, date: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM draw_pool WHERE date = ?1",
            [date],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub async fn pool_number_exists(&self, date: &str, number8: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM draw_pool WHERE date = ?1 AND number8 = ?2",
            params![date, number8],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn insert_pool_entry(&self, entry: &DrawNumber) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO draw_pool (date, seq, round_id, number8, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.date,
                entry.seq,
                entry.round_id,
                entry.number8,
                entry.status.as_str(),
                entry.created_at,
            ],
        )
        .with_context(|| format!("insert pool entry {} for {}", entry.seq, entry.date))?;
        Ok(())
    }

    pub async fn unused_pool_entries(&self, date: &str) -> Result<Vec<DrawNumber>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT date, seq, round_id, number8, status, created_at
             FROM draw_pool WHERE date = ?1 AND status = 'unused' ORDER BY seq ASC",
        )?;
        let entries = stmt
            .query_map([date], map_draw_number)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ---------- rounds ----------

    pub async fn count_rounds(&self, date: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM rounds WHERE date = ?1",
            [date],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Insert a day's rounds and mark the consumed pool entries assigned, all
    /// in one transaction so round creation is all-or-nothing.
    pub async fn create_rounds(&self, date: &str, rounds: &[Round]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for round in rounds {
            tx.execute(
                "INSERT INTO rounds (round_id, date, seq, draw_at, result8, status, settling, settling_at, settled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, NULL)",
                params![
                    round.round_id,
                    round.date,
                    round.seq,
                    round.draw_at,
                    round.result8,
                    round.status.as_str(),
                ],
            )
            .with_context(|| format!("insert round {}", round.round_id))?;
        }
        tx.execute(
            "UPDATE draw_pool SET status = 'assigned' WHERE date = ?1 AND status = 'unused'",
            [date],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub async fn get_round(&self, round_id: &str) -> Result<Option<Round>> {
        let conn = self.conn.lock().await;
        let round = conn
            .query_row(
                "SELECT round_id, date, seq, draw_at, result8, status, settling, settling_at, settled_at
                 FROM rounds WHERE round_id = ?1",
                [round_id],
                map_round,
            )
            .optional()?;
        Ok(round)
    }

    pub async fn rounds_for_date(&self, date: &str) -> Result<Vec<Round>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT round_id, date, seq, draw_at, result8, status, settling, settling_at, settled_at
             FROM rounds WHERE date = ?1 ORDER BY seq ASC",
        )?;
        let rounds = stmt
            .query_map([date], map_round)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rounds)
    }

    // ---------- status clock ----------

    /// open -> closing for rounds inside the pre-close window but not yet due.
    pub async fn promote_open_to_closing(&self, now: i64, window_secs: i64) -> Result<usize> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE rounds SET status = 'closing'
             WHERE status = 'open' AND draw_at <= ?1 + ?2 AND draw_at > ?1",
            params![now, window_secs],
        )?;
        Ok(changed)
    }

    /// Promote rounds whose draw time has passed to drawn. Includes rounds
    /// still `open` (missed their closing window during downtime) so catch-up
    /// can settle them; never touches settling or settled rounds.
    pub async fn promote_due_to_drawn(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE rounds SET status = 'drawn'
             WHERE status IN ('open', 'closing') AND draw_at <= ?1",
            [now],
        )?;
        Ok(changed)
    }

    pub async fn due_round_ids(&self, now: i64) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT round_id FROM rounds
             WHERE settled_at IS NULL AND draw_at <= ?1 ORDER BY draw_at ASC",
        )?;
        let ids = stmt
            .query_map([now], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ---------- settlement lock ----------

    /// Compare-and-set acquisition of the per-round settlement lock. Exactly
    /// one caller wins; everyone else (already settling, already settled, not
    /// yet drawn) gets `false`.
    pub async fn try_acquire_settle_lock(&self, round_id: &str, now: i64) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE rounds SET settling = 1, settling_at = ?2
             WHERE round_id = ?1 AND status = 'drawn' AND settled_at IS NULL AND settling = 0",
            params![round_id, now],
        )?;
        Ok(changed == 1)
    }

    /// Best-effort unlock after a failed settlement so the next tick retries.
    /// Never clears `settled_at`.
    pub async fn clear_settle_lock(&self, round_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE rounds SET settling = 0 WHERE round_id = ?1",
            [round_id],
        )?;
        Ok(())
    }

    // ---------- settlement transaction ----------

    /// The transactional payout pass: tickets graded against the round result,
    /// winners' wallets credited with paired ledger rows, the per-round
    /// summary written, and the round closed out — all-or-nothing.
    ///
    /// Callers must hold the settling lock. On error the transaction rolls
    /// back and the caller is responsible for clearing the lock.
    pub async fn apply_settlement(&self, round_id: &str, now: i64) -> Result<SettlementOutcome> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let round = tx
            .query_row(
                "SELECT round_id, date, seq, draw_at, result8, status, settling, settling_at, settled_at
                 FROM rounds WHERE round_id = ?1",
                [round_id],
                map_round,
            )
            .optional()?
            .with_context(|| format!("round {round_id} not found"))?;
        if round.result8.is_empty() {
            bail!("round {round_id} has no result");
        }

        let tickets: Vec<Ticket> = {
            let mut stmt = tx.prepare(
                "SELECT ticket_id, user_id, round_id, entries, total_stake, total_payout, status, settled_at, created_at
                 FROM tickets WHERE round_id = ?1 AND status = 'pending'",
            )?;
            let tickets = stmt
                .query_map([round_id], map_ticket)?
                .collect::<Result<Vec<_>, _>>()?;
            tickets
        };

        let mut credits = Vec::new();
        let mut total_staked = 0i64;
        let mut total_payout = 0i64;

        for ticket in &tickets {
            let payout = ticket.payout_for(&round.result8);
            total_staked += ticket.total_stake;
            total_payout += payout;

            let status = if payout > 0 {
                TicketStatus::Won
            } else {
                TicketStatus::Lost
            };
            tx.execute(
                "UPDATE tickets SET total_payout = ?1, status = ?2, settled_at = ?3
                 WHERE ticket_id = ?4",
                params![payout, status.as_str(), now, ticket.ticket_id],
            )?;

            if payout > 0 {
                let before: i64 = tx
                    .query_row(
                        "SELECT balance FROM users WHERE user_id = ?1",
                        [&ticket.user_id],
                        |row| row.get(0),
                    )
                    .with_context(|| {
                        format!("load wallet {} for ticket {}", ticket.user_id, ticket.ticket_id)
                    })?;
                let after = before + payout;

                tx.execute(
                    "UPDATE users SET balance = ?1, updated_at = ?2 WHERE user_id = ?3",
                    params![after, now, ticket.user_id],
                )?;
                tx.execute(
                    "INSERT INTO ledger (id, user_id, kind, amount, balance_before, balance_after, round_id, ticket_id, created_at)
                     VALUES (?1, ?2, 'lottery_win', ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        Uuid::new_v4().to_string(),
                        ticket.user_id,
                        payout,
                        before,
                        after,
                        round_id,
                        ticket.ticket_id,
                        now,
                    ],
                )?;

                credits.push(WalletCredit {
                    user_id: ticket.user_id.clone(),
                    ticket_id: ticket.ticket_id.clone(),
                    payout,
                    balance_after: after,
                });
            }
        }

        let summary = SettlementSummary {
            round_id: round_id.to_string(),
            total_tickets: tickets.len() as i64,
            total_staked,
            total_payout,
            processed_at: now,
        };
        tx.execute(
            "INSERT INTO settlement_summaries (round_id, total_tickets, total_staked, total_payout, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                summary.round_id,
                summary.total_tickets,
                summary.total_staked,
                summary.total_payout,
                summary.processed_at,
            ],
        )?;

        tx.execute(
            "UPDATE rounds SET status = 'settled', settled_at = ?1, settling = 0
             WHERE round_id = ?2",
            params![now, round_id],
        )?;

        tx.commit()?;

        Ok(SettlementOutcome {
            round_id: round_id.to_string(),
            result8: round.result8,
            settled_at: now,
            credits,
            summary,
        })
    }

    // ---------- users, tickets, ledger ----------

    pub async fn create_user(&self, user_id: &str, balance: i64, now: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO users (user_id, balance, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![user_id, balance, now],
        )
        .with_context(|| format!("create user {user_id}"))?;
        Ok(())
    }

    pub async fn balance(&self, user_id: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().await;
        let balance = conn
            .query_row(
                "SELECT balance FROM users WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(balance)
    }

    /// Purchase path used by the API layer: debit the wallet, write the
    /// purchase ledger row, and insert the pending ticket in one transaction.
    /// Rejected if the round is not open for betting or funds are short.
    pub async fn purchase_ticket(&self, ticket: &Ticket, now: i64) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM rounds WHERE round_id = ?1",
                [&ticket.round_id],
                |row| row.get(0),
            )
            .optional()?;
        match status.as_deref() {
            None => bail!("round {} not found", ticket.round_id),
            Some("open") => {}
            Some(other) => bail!("round {} not open for betting ({other})", ticket.round_id),
        }

        let before: i64 = tx
            .query_row(
                "SELECT balance FROM users WHERE user_id = ?1",
                [&ticket.user_id],
                |row| row.get(0),
            )
            .optional()?
            .with_context(|| format!("user {} not found", ticket.user_id))?;
        if before < ticket.total_stake {
            bail!(
                "insufficient balance for user {}: have {before}, need {}",
                ticket.user_id,
                ticket.total_stake
            );
        }
        let after = before - ticket.total_stake;

        tx.execute(
            "UPDATE users SET balance = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![after, now, ticket.user_id],
        )?;
        tx.execute(
            "INSERT INTO ledger (id, user_id, kind, amount, balance_before, balance_after, round_id, ticket_id, created_at)
             VALUES (?1, ?2, 'lottery_purchase', ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Uuid::new_v4().to_string(),
                ticket.user_id,
                ticket.total_stake,
                before,
                after,
                ticket.round_id,
                ticket.ticket_id,
                now,
            ],
        )?;
        tx.execute(
            "INSERT INTO tickets (ticket_id, user_id, round_id, entries, total_stake, total_payout, status, settled_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 'pending', NULL, ?6)",
            params![
                ticket.ticket_id,
                ticket.user_id,
                ticket.round_id,
                serde_json::to_string(&ticket.entries)?,
                ticket.total_stake,
                now,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>> {
        let conn = self.conn.lock().await;
        let ticket = conn
            .query_row(
                "SELECT ticket_id, user_id, round_id, entries, total_stake, total_payout, status, settled_at, created_at
                 FROM tickets WHERE ticket_id = ?1",
                [ticket_id],
                map_ticket,
            )
            .optional()?;
        Ok(ticket)
    }

    pub async fn tickets_for_round(&self, round_id: &str) -> Result<Vec<Ticket>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT ticket_id, user_id, round_id, entries, total_stake, total_payout, status, settled_at, created_at
             FROM tickets WHERE round_id = ?1 ORDER BY created_at ASC",
        )?;
        let tickets = stmt
            .query_map([round_id], map_ticket)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    pub async fn ledger_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, user_id, kind, amount, balance_before, balance_after, round_id, ticket_id, created_at
             FROM ledger WHERE user_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let entries = stmt
            .query_map([user_id], |row| {
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    kind: row.get(2)?,
                    amount: row.get(3)?,
                    balance_before: row.get(4)?,
                    balance_after: row.get(5)?,
                    round_id: row.get(6)?,
                    ticket_id: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub async fn settlement_summary(&self, round_id: &str) -> Result<Option<SettlementSummary>> {
        let conn = self.conn.lock().await;
        let summary = conn
            .query_row(
                "SELECT round_id, total_tickets, total_staked, total_payout, processed_at
                 FROM settlement_summaries WHERE round_id = ?1",
                [round_id],
                |row| {
                    Ok(SettlementSummary {
                        round_id: row.get(0)?,
                        total_tickets: row.get(1)?,
                        total_staked: row.get(2)?,
                        total_payout: row.get(3)?,
                        processed_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }
}

fn map_draw_number(row: &Row<'_>) -> rusqlite::Result<DrawNumber> {
    let status_str: String = row.get(4)?;
    let status = DrawStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown draw status: {status_str}").into(),
        )
    })?;
    Ok(DrawNumber {
        date: row.get(0)?,
        seq: row.get(1)?,
        round_id: row.get(2)?,
        number8: row.get(3)?,
        status,
        created_at: row.get(5)?,
    })
}

fn map_round(row: &Row<'_>) -> rusqlite::Result<Round> {
    let status_str: String = row.get(5)?;
    let status = RoundStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unknown round status: {status_str}").into(),
        )
    })?;
    Ok(Round {
        round_id: row.get(0)?,
        date: row.get(1)?,
        seq: row.get(2)?,
        draw_at: row.get(3)?,
        result8: row.get(4)?,
        status,
        settling: row.get::<_, i64>(6)? == 1,
        settling_at: row.get(7)?,
        settled_at: row.get(8)?,
    })
}

fn map_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let entries_json: String = row.get(3)?;
    let entries = serde_json::from_str(&entries_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
    })?;
    let status_str: String = row.get(6)?;
    let status = TicketStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("unknown ticket status: {status_str}").into(),
        )
    })?;
    Ok(Ticket {
        ticket_id: row.get(0)?,
        user_id: row.get(1)?,
        round_id: row.get(2)?,
        entries,
        total_stake: row.get(4)?,
        total_payout: row.get(5)?,
        status,
        settled_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}
