//! # Perp Spread Arb
//!
//! Two-venue perpetual futures spread arbitrage.
//!
//! Every poll the engine reads top of book from venue A and slippage-adjusted
//! entry prices from venue B, prices both trade directions, and dispatches a
//! long/short pair of market orders when a spread clears its threshold and
//! both legs fit under the per-venue position cap.
//!
//! ## Architecture
//!
//! - `config`: Configuration loading and validation
//! - `exchange`: Venue capabilities, the REST gateway adapter and paper accounts
//! - `strategy`: Spreads, exposure, threshold policy, execution and scheduling
//! - `report`: Log tables for snapshots, intents and session totals
//! - `utils`: Shared decimal arithmetic

pub mod config;
pub mod exchange;
pub mod report;
pub mod strategy;
pub mod utils;

pub use config::Config;
