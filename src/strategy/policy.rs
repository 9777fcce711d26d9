//! Threshold policy with position caps and a softened unwind threshold.
//!
//! Each direction is a gate. A gate opens a long leg on one venue and a
//! short leg on the other:
//! - it is eligible only while both legs have headroom under the cap
//! - its threshold drops to `factor * threshold` when the opposite gate's
//!   legs are capped, so the capped side gets unwound sooner
//!
//! A venue already positioned against a proposed leg always has headroom for
//! it, because the leg reduces that venue's exposure.
//!
//! At most one gate is selected per cycle: when both pass (only possible on
//! inconsistent quotes) the larger spread wins.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use super::exposure::PricedPosition;
use super::spread::{ArbDirection, Spreads};
use crate::exchange::{Direction, Venue};

/// Remaining capacity per venue and direction for this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headroom {
    capped: HashMap<(Venue, Direction), bool>,
}

impl Headroom {
    /// Whether `venue` can still add exposure in `direction`.
    pub fn has_room(&self, venue: Venue, direction: Direction) -> bool {
        !self.capped.get(&(venue, direction)).copied().unwrap_or(false)
    }

    /// Mark a venue/direction as capped.
    pub fn with_capped(mut self, venue: Venue, direction: Direction) -> Self {
        self.capped.insert((venue, direction), true);
        self
    }

    /// First leg of `direction` lacking headroom, if any.
    fn blocked_leg(&self, direction: ArbDirection) -> Option<(Venue, Direction)> {
        let legs = [
            (direction.long_venue(), Direction::Long),
            (direction.short_venue(), Direction::Short),
        ];
        legs.into_iter().find(|(venue, side)| !self.has_room(*venue, *side))
    }
}

/// Outcome of one gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    /// Spread at or below the active threshold
    BelowThreshold {
        spread_pct: Decimal,
        active_threshold: Decimal,
    },
    /// Spread cleared the threshold but a leg is capped
    CapacityExceeded {
        spread_pct: Decimal,
        venue: Venue,
        side: Direction,
    },
    /// Spread cleared the threshold and both legs have headroom
    Eligible {
        spread_pct: Decimal,
        active_threshold: Decimal,
    },
}

/// A selected trade candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbOpportunity {
    pub direction: ArbDirection,
    pub spread_pct: Decimal,
    pub active_threshold: Decimal,
    pub eligible: bool,
}

/// Both gate outcomes plus the selected opportunity.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub long_b_short_a: GateOutcome,
    pub short_b_long_a: GateOutcome,
    pub selected: Option<ArbOpportunity>,
}

impl PolicyDecision {
    pub fn gate(&self, direction: ArbDirection) -> &GateOutcome {
        match direction {
            ArbDirection::LongBShortA => &self.long_b_short_a,
            ArbDirection::ShortBLongA => &self.short_b_long_a,
        }
    }

    /// Gates that cleared their threshold but were blocked by a cap.
    pub fn capacity_declines(&self) -> Vec<(ArbDirection, &GateOutcome)> {
        ArbDirection::ALL
            .into_iter()
            .map(|d| (d, self.gate(d)))
            .filter(|(_, g)| matches!(g, GateOutcome::CapacityExceeded { .. }))
            .collect()
    }
}

/// Decides whether and in which direction to trade.
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    threshold: Decimal,
    max_position_usd: Decimal,
    softened_factor: Decimal,
}

impl ThresholdPolicy {
    pub fn new(threshold: Decimal, max_position_usd: Decimal, softened_factor: Decimal) -> Self {
        Self {
            threshold,
            max_position_usd,
            softened_factor,
        }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Whether a venue may take a new leg in `direction`.
    ///
    /// True while the position value is under the cap, and always true when
    /// the venue is currently positioned the other way.
    pub fn has_headroom(&self, position: PricedPosition<'_>, direction: Direction) -> bool {
        if position.position.direction.opposes(direction) {
            return true;
        }
        position.notional_usd() < self.max_position_usd
    }

    /// Headroom of both venues in both directions.
    pub fn headroom(&self, a: PricedPosition<'_>, b: PricedPosition<'_>) -> Headroom {
        let mut headroom = Headroom::default();
        for (venue, position) in [(Venue::A, a), (Venue::B, b)] {
            for direction in [Direction::Long, Direction::Short] {
                if !self.has_headroom(position, direction) {
                    headroom = headroom.with_capped(venue, direction);
                }
            }
        }
        headroom
    }

    /// Threshold in force for `direction`.
    ///
    /// Softened when the reverse direction is blocked by a cap, i.e. this
    /// trade would unwind a capped side.
    pub fn active_threshold(&self, direction: ArbDirection, headroom: &Headroom) -> Decimal {
        if headroom.blocked_leg(direction.reverse()).is_some() {
            self.softened_factor * self.threshold
        } else {
            self.threshold
        }
    }

    /// Evaluate one gate.
    pub fn evaluate_gate(
        &self,
        direction: ArbDirection,
        spreads: &Spreads,
        headroom: &Headroom,
    ) -> GateOutcome {
        let spread_pct = spreads.get(direction);
        let active_threshold = self.active_threshold(direction, headroom);

        if spread_pct <= active_threshold {
            return GateOutcome::BelowThreshold {
                spread_pct,
                active_threshold,
            };
        }

        match headroom.blocked_leg(direction) {
            Some((venue, side)) => GateOutcome::CapacityExceeded {
                spread_pct,
                venue,
                side,
            },
            None => GateOutcome::Eligible {
                spread_pct,
                active_threshold,
            },
        }
    }

    /// Evaluate both gates and select at most one opportunity.
    pub fn decide(&self, spreads: &Spreads, headroom: &Headroom) -> PolicyDecision {
        let long_b_short_a = self.evaluate_gate(ArbDirection::LongBShortA, spreads, headroom);
        let short_b_long_a = self.evaluate_gate(ArbDirection::ShortBLongA, spreads, headroom);

        let selected = [
            (ArbDirection::LongBShortA, &long_b_short_a),
            (ArbDirection::ShortBLongA, &short_b_long_a),
        ]
        .into_iter()
        .filter_map(|(direction, outcome)| match outcome {
            GateOutcome::Eligible {
                spread_pct,
                active_threshold,
            } => Some(ArbOpportunity {
                direction,
                spread_pct: *spread_pct,
                active_threshold: *active_threshold,
                eligible: true,
            }),
            _ => None,
        })
        // Ties keep the first candidate
        .reduce(|best, candidate| {
            if candidate.spread_pct > best.spread_pct {
                candidate
            } else {
                best
            }
        });

        PolicyDecision {
            long_b_short_a,
            short_b_long_a,
            selected,
        }
    }
}
