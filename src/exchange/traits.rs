//! Venue capabilities consumed by the arbitrage engine.
//!
//! The engine never talks to a venue directly. Each venue is reduced to:
//! - a quote source (top of book and slippage-adjusted entry prices)
//! - a position source (current exposure on the traded asset)
//! - an order sink (market orders)
//!
//! The liquidation scanner additionally lists every account on a venue and
//! submits liquidations for the unhealthy ones.
//!
//! Implementations must return fresh snapshots on every call and keep no
//! state that leaks from one cycle into the next.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::error::VenueError;
use super::types::{
    AccountHealth, Direction, EntryPriceEstimate, LiquidationReceipt, MarketOrder, OrderReceipt,
    Position, Quote, Venue,
};

/// Market data for one venue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Returns the venue identifier.
    fn venue(&self) -> Venue;

    /// Current best bid and ask.
    async fn best_bid_ask(&self) -> Result<Quote, VenueError>;

    /// Executable price for `notional_usd` in `direction`, slippage included.
    async fn entry_price(
        &self,
        direction: Direction,
        notional_usd: Decimal,
    ) -> Result<EntryPriceEstimate, VenueError>;
}

/// Account state for one venue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Current position in `asset`. A venue without a position reports flat.
    async fn position(&self, asset: &str) -> Result<Position, VenueError>;
}

/// Order submission for one venue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Submit a market order. Not retried by the caller.
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderReceipt, VenueError>;
}

/// Every account on one venue with its margin health.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn accounts(&self) -> Result<Vec<AccountHealth>, VenueError>;
}

/// Liquidation submission for one venue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiquidationSink: Send + Sync {
    /// Liquidate `account_id`. Fails with `OrderRejected` when the venue refuses.
    async fn liquidate(&self, account_id: &str) -> Result<LiquidationReceipt, VenueError>;
}

/// The three capabilities of one venue, bundled for the engine.
#[derive(Clone)]
pub struct VenueHandle {
    pub venue: Venue,
    pub quotes: Arc<dyn QuoteSource>,
    pub positions: Arc<dyn PositionSource>,
    pub orders: Arc<dyn OrderSink>,
}

impl VenueHandle {
    pub fn new(
        venue: Venue,
        quotes: Arc<dyn QuoteSource>,
        positions: Arc<dyn PositionSource>,
        orders: Arc<dyn OrderSink>,
    ) -> Self {
        Self {
            venue,
            quotes,
            positions,
            orders,
        }
    }

    /// Build a handle from a single client implementing every capability.
    pub fn from_client<C>(venue: Venue, client: Arc<C>) -> Self
    where
        C: QuoteSource + PositionSource + OrderSink + 'static,
    {
        Self {
            venue,
            quotes: client.clone(),
            positions: client.clone(),
            orders: client,
        }
    }
}

impl std::fmt::Debug for VenueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueHandle").field("venue", &self.venue).finish()
    }
}
