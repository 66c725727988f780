//! Lottery round lifecycle & settlement engine.
//!
//! Exposes the engine modules for the worker binary and integration tests.

pub mod clock;
pub mod config;
pub mod engine;
pub mod events;
pub mod models;
pub mod scheduler;
pub mod store;
