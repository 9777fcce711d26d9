//! Paper trading account for dry runs against live market data.
//!
//! Market orders fill instantly at their reference price and pay a taker fee.
//! Quotes keep coming from the wrapped quote source, so spreads are real while
//! positions are simulated.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::error::VenueError;
use super::traits::{OrderSink, PositionSource, QuoteSource};
use super::types::{
    MarketOrder, OrderReceipt, OrderSide, Position, PositionDirection, PositionSize,
    SizeConvention, Venue,
};
use crate::utils::decimal::mid;

/// Simulated account state.
#[derive(Debug, Clone, Default)]
pub struct PaperState {
    /// Signed position in asset units (long = +)
    pub units: Decimal,
    /// Volume-weighted entry price of the open position
    pub entry_price: Decimal,
    pub realized_pnl: Decimal,
    pub total_fees: Decimal,
    pub order_count: u64,
}

/// Paper account for one venue.
pub struct PaperAccount {
    venue: Venue,
    asset: String,
    market: Arc<dyn QuoteSource>,
    convention: SizeConvention,
    fee_rate: Decimal,
    state: RwLock<PaperState>,
    order_id_counter: AtomicU64,
}

impl PaperAccount {
    /// Create a flat paper account reporting sizes in `convention`.
    pub fn new(
        venue: Venue,
        asset: &str,
        market: Arc<dyn QuoteSource>,
        convention: SizeConvention,
        fee_rate: Decimal,
    ) -> Self {
        Self {
            venue,
            asset: asset.to_string(),
            market,
            convention,
            fee_rate,
            state: RwLock::new(PaperState::default()),
            order_id_counter: AtomicU64::new(1),
        }
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    /// Get current paper state for logging.
    pub async fn state(&self) -> PaperState {
        self.state.read().await.clone()
    }

    fn next_order_id(&self) -> u64 {
        self.order_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Apply a fill of `signed_qty` units at `price` to the position.
    fn apply_fill(state: &mut PaperState, signed_qty: Decimal, price: Decimal) {
        let current = state.units;
        let increasing =
            current.is_zero() || current.is_sign_positive() == signed_qty.is_sign_positive();

        if increasing {
            let new_units = current + signed_qty;
            state.entry_price =
                (current.abs() * state.entry_price + signed_qty.abs() * price) / new_units.abs();
            state.units = new_units;
            return;
        }

        // Reducing or flipping
        let closed = signed_qty.abs().min(current.abs());
        let per_unit = price - state.entry_price;
        state.realized_pnl += if current.is_sign_positive() {
            closed * per_unit
        } else {
            -closed * per_unit
        };

        let new_units = current + signed_qty;
        if new_units.is_zero() {
            state.entry_price = Decimal::ZERO;
        } else if new_units.is_sign_positive() != current.is_sign_positive() {
            state.entry_price = price;
        }
        state.units = new_units;
    }
}

#[async_trait]
impl PositionSource for PaperAccount {
    async fn position(&self, asset: &str) -> Result<Position, VenueError> {
        if asset != self.asset {
            return Ok(Position::flat(self.venue, asset));
        }

        let state = self.state.read().await.clone();
        if state.units.is_zero() {
            return Ok(Position::flat(self.venue, asset).with_fees_paid(state.total_fees));
        }

        let quote = self.market.best_bid_ask().await.map_err(|e| {
            VenueError::account(self.venue, format!("cannot mark paper position: {}", e))
        })?;
        let mark = mid(quote.best_bid, quote.best_ask);

        let size = match self.convention {
            SizeConvention::Units => PositionSize::Units(state.units.abs()),
            SizeConvention::NotionalUsd => PositionSize::NotionalUsd(state.units.abs() * mark),
        };
        let direction = if state.units.is_sign_positive() {
            PositionDirection::Long
        } else {
            PositionDirection::Short
        };

        Ok(Position {
            venue: self.venue,
            asset: asset.to_string(),
            size,
            direction,
            unrealized_pnl: state.units * (mark - state.entry_price),
            fees_paid: state.total_fees,
        })
    }
}

#[async_trait]
impl OrderSink for PaperAccount {
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderReceipt, VenueError> {
        if order.asset != self.asset {
            return Err(VenueError::rejected(
                self.venue,
                format!("unknown asset {}", order.asset),
            ));
        }
        if order.quantity <= Decimal::ZERO || order.reference_price <= Decimal::ZERO {
            return Err(VenueError::rejected(
                self.venue,
                format!(
                    "invalid order: quantity {} at {}",
                    order.quantity, order.reference_price
                ),
            ));
        }

        let mut state = self.state.write().await;

        let signed_qty = match order.side {
            OrderSide::Buy => order.quantity,
            OrderSide::Sell => -order.quantity,
        };
        let fee = order.quantity * order.reference_price * self.fee_rate;

        Self::apply_fill(&mut state, signed_qty, order.reference_price);
        state.total_fees += fee;
        state.realized_pnl -= fee;
        state.order_count += 1;

        let order_id = self.next_order_id();

        info!(
            venue = %self.venue,
            order_id,
            client_order_id = %order.client_order_id,
            side = %order.side,
            quantity = %order.quantity,
            price = %order.reference_price,
            fee = %fee,
            position_units = %state.units,
            "Paper order filled"
        );
        debug!(realized_pnl = %state.realized_pnl, total_fees = %state.total_fees, "Paper account");

        Ok(OrderReceipt {
            order_id: format!("paper-{}", order_id),
            client_order_id: order.client_order_id.clone(),
            filled_quantity: order.quantity,
            average_price: order.reference_price,
            accepted_at: Utc::now(),
        })
    }
}

/// Default paper taker fee (0.05%).
pub fn default_fee_rate() -> Decimal {
    dec!(0.0005)
}
