//! Net directional exposure across both venues.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::exchange::{Position, Venue};

/// Sum of both venues' signed positions, in asset units (long = +).
///
/// Recomputed from fresh position reads every cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetExposure {
    pub asset: String,
    pub signed_size_units: Decimal,
    pub venue_a_units: Decimal,
    pub venue_b_units: Decimal,
}

impl NetExposure {
    /// Whether the residual delta stays within `tolerance_units`.
    pub fn is_balanced(&self, tolerance_units: Decimal) -> bool {
        self.signed_size_units.abs() <= tolerance_units
    }

    pub fn units_on(&self, venue: Venue) -> Decimal {
        match venue {
            Venue::A => self.venue_a_units,
            Venue::B => self.venue_b_units,
        }
    }
}

/// A position read together with the price used to normalize it to units.
#[derive(Debug, Clone, Copy)]
pub struct PricedPosition<'a> {
    pub position: &'a Position,
    pub reference_price: Decimal,
}

impl<'a> PricedPosition<'a> {
    pub fn new(position: &'a Position, reference_price: Decimal) -> Self {
        Self {
            position,
            reference_price,
        }
    }

    pub fn signed_units(&self) -> Decimal {
        self.position.signed_units(self.reference_price)
    }

    pub fn notional_usd(&self) -> Decimal {
        self.position.notional_usd(self.reference_price)
    }
}

/// Combines two venues' positions into one net exposure.
#[derive(Debug, Clone, Default)]
pub struct ExposureAggregator;

impl ExposureAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Normalize each side to signed asset units with its own convention and sum.
    ///
    /// A flat venue contributes zero.
    pub fn combine(&self, a: PricedPosition<'_>, b: PricedPosition<'_>) -> NetExposure {
        let venue_a_units = a.signed_units();
        let venue_b_units = b.signed_units();

        NetExposure {
            asset: a.position.asset.clone(),
            signed_size_units: venue_a_units + venue_b_units,
            venue_a_units,
            venue_b_units,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{PositionDirection, PositionSize};
    use rust_decimal_macros::dec;

    fn position(venue: Venue, size: PositionSize, direction: PositionDirection) -> Position {
        Position {
            venue,
            asset: "SOL".to_string(),
            size,
            direction,
            unrealized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
        }
    }

    #[test]
    fn test_hedged_positions_net_to_zero() {
        // A reports native units, B reports USD notional
        let a = position(Venue::A, PositionSize::Units(dec!(10)), PositionDirection::Short);
        let b = position(Venue::B, PositionSize::NotionalUsd(dec!(1000)), PositionDirection::Long);

        let exposure = ExposureAggregator::new()
            .combine(PricedPosition::new(&a, dec!(100.05)), PricedPosition::new(&b, dec!(100)));

        assert_eq!(exposure.venue_a_units, dec!(-10));
        assert_eq!(exposure.venue_b_units, dec!(10));
        assert_eq!(exposure.signed_size_units, Decimal::ZERO);
        assert!(exposure.is_balanced(dec!(0.01)));
    }

    #[test]
    fn test_unit_conventions_are_interchangeable() {
        let price = dec!(80);
        let native = position(Venue::A, PositionSize::Units(dec!(2.5)), PositionDirection::Long);
        let notional =
            position(Venue::B, PositionSize::NotionalUsd(dec!(200)), PositionDirection::Long);

        assert_eq!(
            PricedPosition::new(&native, price).signed_units(),
            PricedPosition::new(&notional, price).signed_units()
        );
    }

    #[test]
    fn test_flat_venue_counts_as_zero() {
        let a = Position::flat(Venue::A, "SOL");
        let b = position(Venue::B, PositionSize::Units(dec!(3)), PositionDirection::Short);

        let exposure = ExposureAggregator::new()
            .combine(PricedPosition::new(&a, dec!(100)), PricedPosition::new(&b, dec!(100)));

        assert_eq!(exposure.signed_size_units, dec!(-3));
        assert_eq!(exposure.units_on(Venue::A), Decimal::ZERO);
        assert!(!exposure.is_balanced(dec!(1)));
    }
}
