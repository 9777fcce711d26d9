//! Venue integrations for spread arbitrage.
//!
//! ## Capabilities
//! The engine consumes each venue through three traits:
//! - [`QuoteSource`]: top of book and slippage-adjusted entry prices
//! - [`PositionSource`]: current exposure on the traded asset
//! - [`OrderSink`]: market order submission
//!
//! The liquidation scanner uses [`AccountDirectory`] and [`LiquidationSink`].
//!
//! ## Adapters
//! - [`GatewayClient`]: REST access to a venue gateway (live trading)
//! - [`PaperAccount`]: simulated positions and fills over live quotes

pub mod depth;
mod error;
pub mod gateway;
pub mod paper;
mod traits;
mod types;

pub use depth::{BookLevel, OrderBook};
pub use error::VenueError;
pub use gateway::{GatewayClient, GatewayConfig};
pub use paper::PaperAccount;
pub use traits::{
    AccountDirectory, LiquidationSink, OrderSink, PositionSource, QuoteSource, VenueHandle,
};
#[cfg(test)]
pub use traits::{
    MockAccountDirectory, MockLiquidationSink, MockOrderSink, MockPositionSource,
    MockQuoteSource,
};
pub use types::*;
