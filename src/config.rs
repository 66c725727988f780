//! Engine configuration, sourced from the environment with sane defaults.

use std::env;

/// Tunables for the round lifecycle and the scheduler.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub db_path: String,
    /// Rounds (and pool entries) per calendar day.
    pub rounds_per_day: u32,
    /// Hours between consecutive draws.
    pub round_interval_hours: u32,
    /// Operational hour of the first draw of the day.
    pub base_draw_hour: u32,
    /// Betting closes this many minutes before the draw.
    pub close_before_minutes: u32,
    /// Catch-up window in days (today plus this many days back).
    pub lookback_days: u32,
    pub status_tick_secs: u64,
    pub settle_tick_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: "lotto_engine.db".to_string(),
            rounds_per_day: 12,
            round_interval_hours: 2,
            base_draw_hour: 2,
            close_before_minutes: 5,
            lookback_days: 5,
            status_tick_secs: 30,
            settle_tick_secs: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            db_path: env::var("LOTTO_DB_PATH").unwrap_or(d.db_path),
            rounds_per_day: env_u32("LOTTO_ROUNDS_PER_DAY", d.rounds_per_day, |v| v > 0),
            round_interval_hours: env_u32("LOTTO_ROUND_INTERVAL_HOURS", d.round_interval_hours, |v| {
                v > 0
            }),
            base_draw_hour: env_u32("LOTTO_BASE_DRAW_HOUR", d.base_draw_hour, |v| v < 24),
            close_before_minutes: env_u32("LOTTO_CLOSE_BEFORE_MINUTES", d.close_before_minutes, |v| {
                v > 0
            }),
            lookback_days: env_u32("LOTTO_LOOKBACK_DAYS", d.lookback_days, |_| true),
            status_tick_secs: env_u64("LOTTO_STATUS_TICK_SECS", d.status_tick_secs),
            settle_tick_secs: env_u64("LOTTO_SETTLE_TICK_SECS", d.settle_tick_secs),
        }
    }
}

fn env_u32(name: &str, default: u32, valid: impl Fn(u32) -> bool) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|&v| valid(v))
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(default)
}
