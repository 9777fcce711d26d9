//! Directional spread computation.
//!
//! Venue A contributes its top of book, venue B its slippage-adjusted entry
//! prices. Each spread is the percentage earned by buying on one venue and
//! selling on the other, relative to the buy price:
//!
//! ```text
//! long B / short A = (A.bid - B.long_entry) / B.long_entry * 100
//! short B / long A = (B.short_entry - A.ask) / A.ask * 100
//! ```
//!
//! Positive means profitable net of slippage.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::exchange::{EntryPriceEstimate, Quote, Venue};
use crate::utils::decimal::spread_pct;

/// The two mutually exclusive trade directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArbDirection {
    /// Buy on venue B, sell on venue A
    LongBShortA,
    /// Sell on venue B, buy on venue A
    ShortBLongA,
}

impl ArbDirection {
    pub const ALL: [ArbDirection; 2] = [ArbDirection::LongBShortA, ArbDirection::ShortBLongA];

    /// Venue receiving the long leg.
    pub fn long_venue(self) -> Venue {
        match self {
            ArbDirection::LongBShortA => Venue::B,
            ArbDirection::ShortBLongA => Venue::A,
        }
    }

    /// Venue receiving the short leg.
    pub fn short_venue(self) -> Venue {
        self.long_venue().counterpart()
    }

    pub fn reverse(self) -> ArbDirection {
        match self {
            ArbDirection::LongBShortA => ArbDirection::ShortBLongA,
            ArbDirection::ShortBLongA => ArbDirection::LongBShortA,
        }
    }
}

impl fmt::Display for ArbDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArbDirection::LongBShortA => write!(f, "long-b/short-a"),
            ArbDirection::ShortBLongA => write!(f, "short-b/long-a"),
        }
    }
}

/// Both directional spreads of one cycle, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spreads {
    pub long_b_short_a: Decimal,
    pub short_b_long_a: Decimal,
}

impl Spreads {
    pub fn get(&self, direction: ArbDirection) -> Decimal {
        match direction {
            ArbDirection::LongBShortA => self.long_b_short_a,
            ArbDirection::ShortBLongA => self.short_b_long_a,
        }
    }
}

/// Prices used to open each leg of a direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegPrices {
    pub long_price: Decimal,
    pub short_price: Decimal,
}

/// Computes directional spreads from one cycle's quotes.
#[derive(Debug, Clone, Default)]
pub struct SpreadEvaluator;

impl SpreadEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate both spreads.
    pub fn evaluate(
        &self,
        quote_a: &Quote,
        b_long: &EntryPriceEstimate,
        b_short: &EntryPriceEstimate,
    ) -> Spreads {
        Spreads {
            long_b_short_a: spread_pct(quote_a.best_bid, b_long.price, b_long.price),
            short_b_long_a: spread_pct(b_short.price, quote_a.best_ask, quote_a.best_ask),
        }
    }

    /// Reference prices for each leg: A trades at its touch, B at its entry estimate.
    pub fn leg_prices(
        &self,
        direction: ArbDirection,
        quote_a: &Quote,
        b_long: &EntryPriceEstimate,
        b_short: &EntryPriceEstimate,
    ) -> LegPrices {
        match direction {
            ArbDirection::LongBShortA => LegPrices {
                long_price: b_long.price,
                short_price: quote_a.best_bid,
            },
            ArbDirection::ShortBLongA => LegPrices {
                long_price: quote_a.best_ask,
                short_price: b_short.price,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Direction;
    use rust_decimal_macros::dec;

    fn inputs() -> (Quote, EntryPriceEstimate, EntryPriceEstimate) {
        (
            Quote {
                venue: Venue::A,
                best_bid: dec!(100.00),
                best_ask: dec!(100.10),
            },
            EntryPriceEstimate {
                venue: Venue::B,
                direction: Direction::Long,
                price: dec!(99.00),
            },
            EntryPriceEstimate {
                venue: Venue::B,
                direction: Direction::Short,
                price: dec!(101.00),
            },
        )
    }

    #[test]
    fn test_long_b_short_a_spread() {
        let (quote, long, short) = inputs();
        let spreads = SpreadEvaluator::new().evaluate(&quote, &long, &short);

        // (100.00 - 99.00) / 99.00 * 100 ~= 1.0101
        assert_eq!(spreads.long_b_short_a.round_dp(4), dec!(1.0101));
    }

    #[test]
    fn test_short_b_long_a_spread() {
        let (quote, long, short) = inputs();
        let spreads = SpreadEvaluator::new().evaluate(&quote, &long, &short);

        // (101.00 - 100.10) / 100.10 * 100 ~= 0.8991
        assert_eq!(spreads.short_b_long_a.round_dp(4), dec!(0.8991));
    }

    #[test]
    fn test_spread_sign_negative_when_unprofitable() {
        let (mut quote, long, short) = inputs();
        quote.best_bid = dec!(98);
        quote.best_ask = dec!(102);
        let spreads = SpreadEvaluator::new().evaluate(&quote, &long, &short);

        assert!(spreads.long_b_short_a < Decimal::ZERO);
        assert!(spreads.short_b_long_a < Decimal::ZERO);
    }

    #[test]
    fn test_leg_prices_follow_direction() {
        let (quote, long, short) = inputs();
        let evaluator = SpreadEvaluator::new();

        let prices = evaluator.leg_prices(ArbDirection::LongBShortA, &quote, &long, &short);
        assert_eq!(prices.long_price, dec!(99.00));
        assert_eq!(prices.short_price, dec!(100.00));

        let prices = evaluator.leg_prices(ArbDirection::ShortBLongA, &quote, &long, &short);
        assert_eq!(prices.long_price, dec!(100.10));
        assert_eq!(prices.short_price, dec!(101.00));
    }

    #[test]
    fn test_direction_venues() {
        assert_eq!(ArbDirection::LongBShortA.long_venue(), Venue::B);
        assert_eq!(ArbDirection::LongBShortA.short_venue(), Venue::A);
        assert_eq!(ArbDirection::ShortBLongA.long_venue(), Venue::A);
        assert_eq!(ArbDirection::LongBShortA.reverse(), ArbDirection::ShortBLongA);
    }
}
