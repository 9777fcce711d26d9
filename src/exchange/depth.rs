//! Order book depth and slippage estimation.
//!
//! Entry prices are derived from how far a market order of a given notional
//! walks into the book, then applied to the mark price:
//!
//! ```text
//! slippage = |average_fill - mark| / mark
//! long entry  = mark * (1 + slippage)
//! short entry = mark * (1 - slippage)
//! ```

use rust_decimal::Decimal;
use serde::Deserialize;

use super::error::VenueError;
use super::types::{Direction, EntryPriceEstimate, Quote, Venue};

/// One price level: `[price, size]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "(Decimal, Decimal)")]
pub struct BookLevel {
    pub price: Decimal,
    /// Size in asset units
    pub size: Decimal,
}

impl From<(Decimal, Decimal)> for BookLevel {
    fn from((price, size): (Decimal, Decimal)) -> Self {
        Self { price, size }
    }
}

/// Aggregated order book, bids best-first descending, asks best-first ascending.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrderBook {
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    pub fn new(mut bids: Vec<BookLevel>, mut asks: Vec<BookLevel>) -> Self {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self { bids, asks }
    }

    /// Top of book for `venue`.
    pub fn best_bid_ask(&self, venue: Venue) -> Result<Quote, VenueError> {
        let best_bid = self
            .bids
            .first()
            .ok_or_else(|| VenueError::market_data(venue, "no bids in book"))?
            .price;
        let best_ask = self
            .asks
            .first()
            .ok_or_else(|| VenueError::market_data(venue, "no asks in book"))?
            .price;

        Ok(Quote {
            venue,
            best_bid,
            best_ask,
        })
    }

    /// Volume-weighted price of filling `notional_usd` against the book.
    ///
    /// Longs consume asks, shorts consume bids. Fails when the side is too
    /// thin to absorb the full notional.
    pub fn average_fill_price(
        &self,
        venue: Venue,
        direction: Direction,
        notional_usd: Decimal,
    ) -> Result<Decimal, VenueError> {
        let levels = match direction {
            Direction::Long => &self.asks,
            Direction::Short => &self.bids,
        };

        if notional_usd <= Decimal::ZERO {
            return levels.first().map(|level| level.price).ok_or_else(|| {
                VenueError::market_data(venue, format!("no {} liquidity", direction))
            });
        }

        let overflow = || VenueError::market_data(venue, "book level overflow");
        let mut remaining_usd = notional_usd;
        let mut filled_units = Decimal::ZERO;

        for level in levels {
            if level.price <= Decimal::ZERO || level.size <= Decimal::ZERO {
                return Err(VenueError::market_data(
                    venue,
                    format!("invalid book level {} x {}", level.price, level.size),
                ));
            }

            let level_usd = level.price.checked_mul(level.size).ok_or_else(overflow)?;
            if level_usd >= remaining_usd {
                let units = remaining_usd.checked_div(level.price).ok_or_else(overflow)?;
                filled_units = filled_units.checked_add(units).ok_or_else(overflow)?;
                remaining_usd = Decimal::ZERO;
                break;
            }
            filled_units = filled_units.checked_add(level.size).ok_or_else(overflow)?;
            remaining_usd = remaining_usd.checked_sub(level_usd).ok_or_else(overflow)?;
        }

        if remaining_usd > Decimal::ZERO || filled_units == Decimal::ZERO {
            return Err(VenueError::market_data(
                venue,
                format!(
                    "insufficient {} depth for ${} (${} unfilled)",
                    direction, notional_usd, remaining_usd
                ),
            ));
        }

        notional_usd.checked_div(filled_units).ok_or_else(overflow)
    }

    /// Fractional slippage of a `notional_usd` order relative to `mark`.
    pub fn slippage_fraction(
        &self,
        venue: Venue,
        direction: Direction,
        notional_usd: Decimal,
        mark: Decimal,
    ) -> Result<Decimal, VenueError> {
        if mark <= Decimal::ZERO {
            return Err(VenueError::market_data(venue, format!("invalid mark price {}", mark)));
        }
        let average = self.average_fill_price(venue, direction, notional_usd)?;
        average
            .checked_sub(mark)
            .and_then(|diff| diff.checked_div(mark))
            .map(|fraction| fraction.abs())
            .ok_or_else(|| VenueError::market_data(venue, "slippage overflow"))
    }

    /// Slippage-adjusted entry price around `mark`.
    pub fn entry_price(
        &self,
        venue: Venue,
        direction: Direction,
        notional_usd: Decimal,
        mark: Decimal,
    ) -> Result<EntryPriceEstimate, VenueError> {
        let slippage = self.slippage_fraction(venue, direction, notional_usd, mark)?;
        let factor = match direction {
            Direction::Long => Decimal::ONE.checked_add(slippage),
            Direction::Short => Decimal::ONE.checked_sub(slippage),
        };
        let price = factor
            .and_then(|factor| mark.checked_mul(factor))
            .ok_or_else(|| VenueError::market_data(venue, "entry price overflow"))?;

        Ok(EntryPriceEstimate {
            venue,
            direction,
            price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> OrderBook {
        OrderBook::new(
            vec![
                BookLevel::from((dec!(99), dec!(10))),
                BookLevel::from((dec!(100), dec!(5))),
            ],
            vec![
                BookLevel::from((dec!(102), dec!(10))),
                BookLevel::from((dec!(101), dec!(5))),
            ],
        )
    }

    #[test]
    fn test_levels_sorted_best_first() {
        let book = book();
        let quote = book.best_bid_ask(Venue::A).unwrap();
        assert_eq!(quote.best_bid, dec!(100));
        assert_eq!(quote.best_ask, dec!(101));
    }

    #[test]
    fn test_fill_within_top_level_has_no_slippage_against_top() {
        let book = book();
        let avg = book.average_fill_price(Venue::A, Direction::Long, dec!(101)).unwrap();
        assert_eq!(avg, dec!(101));
    }

    #[test]
    fn test_fill_walks_multiple_levels() {
        let book = book();
        // 5 units @ 101 = 505, then 497 / 102 units
        let avg = book.average_fill_price(Venue::A, Direction::Long, dec!(1002)).unwrap();
        assert!(avg > dec!(101) && avg < dec!(102));
    }

    #[test]
    fn test_insufficient_depth_is_market_data_error() {
        let book = book();
        let err = book
            .average_fill_price(Venue::B, Direction::Short, dec!(1_000_000))
            .unwrap_err();
        assert!(matches!(err, VenueError::MarketDataUnavailable { venue: Venue::B, .. }));
    }

    #[test]
    fn test_entry_price_direction_sign() {
        let book = book();
        let mark = dec!(100.5);
        // Within the $1525 of asks and $1490 of bids in the fixture
        let long = book.entry_price(Venue::B, Direction::Long, dec!(1200), mark).unwrap();
        let short = book.entry_price(Venue::B, Direction::Short, dec!(1200), mark).unwrap();

        assert!(long.price > mark);
        assert!(short.price < mark);
        assert_eq!(long.direction, Direction::Long);
    }

    #[test]
    fn test_slippage_grows_with_size() {
        let book = book();
        let mark = dec!(100.5);
        let small = book.slippage_fraction(Venue::B, Direction::Long, dec!(100), mark).unwrap();
        let large = book.slippage_fraction(Venue::B, Direction::Long, dec!(1500), mark).unwrap();
        assert!(large > small);
    }

    #[test]
    fn test_empty_book_rejected() {
        let empty = OrderBook::default();
        assert!(empty.best_bid_ask(Venue::A).is_err());
        assert!(empty.entry_price(Venue::A, Direction::Long, dec!(10), dec!(100)).is_err());
    }

    #[test]
    fn test_deserialize_wire_levels() {
        let book: OrderBook =
            serde_json::from_str(r#"{"bids": [["99.5", "3"]], "asks": [["100.5", "2"]]}"#).unwrap();
        assert_eq!(book.bids[0].price, dec!(99.5));
        assert_eq!(book.asks[0].size, dec!(2));
    }

    #[test]
    fn test_overflowing_level_is_market_data_error() {
        let book = OrderBook::new(
            vec![BookLevel::from((dec!(99), dec!(10)))],
            vec![BookLevel::from((dec!(79228162514264337593543950), dec!(100000)))],
        );

        let err = book
            .entry_price(Venue::B, Direction::Long, dec!(1000), dec!(100))
            .unwrap_err();
        assert!(matches!(err, VenueError::MarketDataUnavailable { venue: Venue::B, .. }));
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn test_non_positive_levels_rejected() {
        let book = OrderBook::new(
            vec![BookLevel::from((dec!(99), dec!(-1)))],
            vec![BookLevel::from((Decimal::ZERO, dec!(10)))],
        );

        assert!(book.average_fill_price(Venue::A, Direction::Long, dec!(10)).is_err());
        assert!(book.average_fill_price(Venue::A, Direction::Short, dec!(10)).is_err());
    }
}
