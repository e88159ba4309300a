//! Liquidity-baking toggle monitor.
//!
//! Streams blocks from the TzKT events hub, derives the toggle EMA metrics
//! per block, keeps a filtered rolling history for the terminal dashboard
//! and appends OFF votes to a resumable JSONL log.

pub mod block;
pub mod config;
pub mod dashboard;
pub mod history;
pub mod logging;
pub mod monitor;
pub mod store;
pub mod ws;
