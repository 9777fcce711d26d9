//! Venue-neutral value types exchanged between adapters and the engine.
//!
//! Every value here is a snapshot taken during one evaluation cycle and is
//! discarded when the cycle ends.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two configured trading venues.
///
/// Venue A is read through its top of book; venue B through
/// slippage-adjusted entry price estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    A,
    B,
}

impl Venue {
    /// The other venue of the pair.
    pub fn counterpart(self) -> Venue {
        match self {
            Venue::A => Venue::B,
            Venue::B => Venue::A,
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::A => write!(f, "venue-a"),
            Venue::B => write!(f, "venue-b"),
        }
    }
}

/// Economic direction of a trade or position leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Order side that opens exposure in this direction.
    pub fn order_side(self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Direction of a held position, including no position at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionDirection {
    Long,
    Short,
    Flat,
}

impl PositionDirection {
    /// +1 for long, -1 for short, 0 when flat.
    pub fn sign(self) -> Decimal {
        match self {
            PositionDirection::Long => Decimal::ONE,
            PositionDirection::Short => Decimal::NEGATIVE_ONE,
            PositionDirection::Flat => Decimal::ZERO,
        }
    }

    /// Whether the position currently points the other way from `direction`.
    pub fn opposes(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (PositionDirection::Long, Direction::Short)
                | (PositionDirection::Short, Direction::Long)
        )
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Best bid/ask snapshot for one venue.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub venue: Venue,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

/// All-in executable price for a notional size, slippage included.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPriceEstimate {
    pub venue: Venue,
    pub direction: Direction,
    pub price: Decimal,
}

/// How a venue expresses position size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeConvention {
    /// Size is in native asset units.
    Units,
    /// Size is USD notional and must be divided by a price to get units.
    NotionalUsd,
}

/// Unsigned position size as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionSize {
    Units(Decimal),
    NotionalUsd(Decimal),
}

impl PositionSize {
    pub fn from_convention(convention: SizeConvention, amount: Decimal) -> Self {
        match convention {
            SizeConvention::Units => PositionSize::Units(amount.abs()),
            SizeConvention::NotionalUsd => PositionSize::NotionalUsd(amount.abs()),
        }
    }
}

/// Current held exposure on one venue.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub venue: Venue,
    pub asset: String,
    pub size: PositionSize,
    pub direction: PositionDirection,
    /// Unrealized PnL in USD, for monitoring only
    pub unrealized_pnl: Decimal,
    /// Cumulative trading fees the account has paid on this venue, in USD
    pub fees_paid: Decimal,
}

impl Position {
    /// A venue with no open position.
    pub fn flat(venue: Venue, asset: &str) -> Self {
        Self {
            venue,
            asset: asset.to_string(),
            size: PositionSize::Units(Decimal::ZERO),
            direction: PositionDirection::Flat,
            unrealized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
        }
    }

    pub fn with_fees_paid(mut self, fees_paid: Decimal) -> Self {
        self.fees_paid = fees_paid;
        self
    }

    /// Unsigned size in asset units, converting notional at `reference_price`.
    pub fn units(&self, reference_price: Decimal) -> Decimal {
        match self.size {
            PositionSize::Units(units) => units,
            PositionSize::NotionalUsd(usd) => crate::utils::decimal::safe_div(usd, reference_price),
        }
    }

    /// Signed size in asset units (long = +, short = -).
    pub fn signed_units(&self, reference_price: Decimal) -> Decimal {
        self.units(reference_price) * self.direction.sign()
    }

    /// Unsigned USD value of the position at `reference_price`.
    pub fn notional_usd(&self, reference_price: Decimal) -> Decimal {
        match self.size {
            PositionSize::Units(units) => units * reference_price,
            PositionSize::NotionalUsd(usd) => usd,
        }
    }
}

/// A market order for one leg of an arbitrage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrder {
    /// `{sequence_id}-{venue}` so both legs of one intent are traceable
    pub client_order_id: String,
    pub asset: String,
    pub side: OrderSide,
    pub notional_usd: Decimal,
    pub reference_price: Decimal,
    pub quantity: Decimal,
}

/// Venue acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: String,
    pub client_order_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub filled_quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub average_price: Decimal,
    pub accepted_at: DateTime<Utc>,
}

/// Margin health of one account on a venue, as listed by its directory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHealth {
    /// Venue address of the account, the target of a liquidation
    pub account_id: String,
    /// Owner of the account
    pub authority: String,
    pub can_be_liquidated: bool,
}

/// Venue acknowledgement of a liquidation transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationReceipt {
    pub account_id: String,
    pub tx_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_notional_and_native_positions_agree_in_units() {
        let price = dec!(125);
        let notional = Position {
            venue: Venue::B,
            asset: "SOL".to_string(),
            size: PositionSize::NotionalUsd(dec!(2500)),
            direction: PositionDirection::Short,
            unrealized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
        };
        let native = Position {
            venue: Venue::A,
            asset: "SOL".to_string(),
            size: PositionSize::Units(dec!(20)),
            direction: PositionDirection::Short,
            unrealized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
        };

        assert_eq!(notional.signed_units(price), dec!(-20));
        assert_eq!(native.signed_units(price), notional.signed_units(price));
        assert_eq!(native.notional_usd(price), notional.notional_usd(price));
    }

    #[test]
    fn test_flat_position_is_zero() {
        let flat = Position::flat(Venue::A, "SOL");
        assert_eq!(flat.signed_units(dec!(100)), Decimal::ZERO);
        assert_eq!(flat.notional_usd(dec!(100)), Decimal::ZERO);
    }

    #[test]
    fn test_position_direction_opposes() {
        assert!(PositionDirection::Long.opposes(Direction::Short));
        assert!(PositionDirection::Short.opposes(Direction::Long));
        assert!(!PositionDirection::Flat.opposes(Direction::Long));
        assert!(!PositionDirection::Long.opposes(Direction::Long));
    }

    #[test]
    fn test_direction_sides() {
        assert_eq!(Direction::Long.order_side(), OrderSide::Buy);
        assert_eq!(Direction::Short.order_side(), OrderSide::Sell);
        assert_eq!(Direction::Long.opposite(), Direction::Short);
        assert_eq!(Venue::A.counterpart(), Venue::B);
    }
}
