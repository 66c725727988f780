//! Round lifecycle engine: pool generation, round creation, status
//! transitions, settlement, and catch-up recovery.
//!
//! Every function here is a plain async function of (store, config, now) so
//! the scheduler, the catch-up sweep, and tests all drive the same code.

pub mod catchup;
pub mod pool;
pub mod rounds;
pub mod settlement;
pub mod status;

pub use catchup::run_catch_up;
pub use pool::ensure_daily_pool;
pub use rounds::ensure_daily_rounds;
pub use settlement::{settle_due_rounds, settle_round};
pub use status::advance_round_statuses;
