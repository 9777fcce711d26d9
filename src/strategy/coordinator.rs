//! Two-legged order execution.
//!
//! Both legs of an intent are dispatched concurrently and independently.
//! There is no cross-venue transaction: a rejected leg is logged and
//! reported, never retried or rolled back. The next cycle sees the resulting
//! imbalance through fresh position reads.

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::policy::ArbOpportunity;
use super::spread::{ArbDirection, LegPrices};
use crate::exchange::{
    Direction, MarketOrder, OrderReceipt, OrderSink, OrderSide, Venue, VenueError,
};
use crate::utils::decimal::safe_div;

/// Process-wide monotonically increasing intent counter.
///
/// Cloning shares the same counter.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: Arc<AtomicU64>,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(first)),
        }
    }

    /// Reserve the next id. Never reused.
    pub fn reserve(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Id the next reservation will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

/// One leg of an order intent.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLeg {
    pub venue: Venue,
    pub direction: Direction,
    pub notional_usd: Decimal,
    pub reference_price: Decimal,
    pub quantity: Decimal,
}

impl OrderLeg {
    pub fn side(&self) -> OrderSide {
        self.direction.order_side()
    }
}

/// Atomic unit of execution: a long and a short leg of equal notional.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub sequence_id: u64,
    pub asset: String,
    pub direction: ArbDirection,
    pub spread_pct: Decimal,
    pub long_leg: OrderLeg,
    pub short_leg: OrderLeg,
}

impl OrderIntent {
    pub fn legs(&self) -> [&OrderLeg; 2] {
        [&self.long_leg, &self.short_leg]
    }

    fn market_order(&self, leg: &OrderLeg) -> MarketOrder {
        MarketOrder {
            client_order_id: format!("{}-{}", self.sequence_id, leg.venue),
            asset: self.asset.clone(),
            side: leg.side(),
            notional_usd: leg.notional_usd,
            reference_price: leg.reference_price,
            quantity: leg.quantity,
        }
    }
}

/// Result of dispatching one leg.
#[derive(Debug, Clone)]
pub struct LegOutcome {
    pub leg: OrderLeg,
    pub result: Result<OrderReceipt, VenueError>,
}

impl LegOutcome {
    pub fn is_filled(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-leg results of one dispatched intent.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub intent: OrderIntent,
    pub long: LegOutcome,
    pub short: LegOutcome,
}

impl ExecutionReport {
    pub fn fully_filled(&self) -> bool {
        self.long.is_filled() && self.short.is_filled()
    }

    /// Exactly one leg went through, leaving directional exposure.
    pub fn is_unbalanced(&self) -> bool {
        self.long.is_filled() != self.short.is_filled()
    }

    pub fn failures(&self) -> Vec<&VenueError> {
        [&self.long, &self.short]
            .into_iter()
            .filter_map(|o| o.result.as_ref().err())
            .collect()
    }
}

/// Builds and dispatches two-legged order intents.
pub struct ExecutionCoordinator {
    asset: String,
    venue_a: Arc<dyn OrderSink>,
    venue_b: Arc<dyn OrderSink>,
    sequence: SequenceCounter,
    order_timeout: Duration,
}

impl ExecutionCoordinator {
    pub fn new(
        asset: &str,
        venue_a: Arc<dyn OrderSink>,
        venue_b: Arc<dyn OrderSink>,
        sequence: SequenceCounter,
        order_timeout: Duration,
    ) -> Self {
        Self {
            asset: asset.to_string(),
            venue_a,
            venue_b,
            sequence,
            order_timeout,
        }
    }

    pub fn sequence(&self) -> &SequenceCounter {
        &self.sequence
    }

    fn sink(&self, venue: Venue) -> &Arc<dyn OrderSink> {
        match venue {
            Venue::A => &self.venue_a,
            Venue::B => &self.venue_b,
        }
    }

    /// Build the intent for `opportunity` with `sequence_id`.
    ///
    /// Each leg trades `notional_usd`; its quantity is the notional divided
    /// by that leg's reference price.
    pub fn build_intent(
        &self,
        sequence_id: u64,
        opportunity: &ArbOpportunity,
        prices: LegPrices,
        notional_usd: Decimal,
    ) -> OrderIntent {
        let direction = opportunity.direction;
        let leg = |venue: Venue, side: Direction, reference_price: Decimal| OrderLeg {
            venue,
            direction: side,
            notional_usd,
            reference_price,
            quantity: safe_div(notional_usd, reference_price),
        };

        OrderIntent {
            sequence_id,
            asset: self.asset.clone(),
            direction,
            spread_pct: opportunity.spread_pct,
            long_leg: leg(direction.long_venue(), Direction::Long, prices.long_price),
            short_leg: leg(direction.short_venue(), Direction::Short, prices.short_price),
        }
    }

    /// Reserve a sequence id and build the intent for `opportunity`.
    pub fn prepare(
        &self,
        opportunity: &ArbOpportunity,
        prices: LegPrices,
        notional_usd: Decimal,
    ) -> OrderIntent {
        let sequence_id = self.sequence.reserve();
        self.build_intent(sequence_id, opportunity, prices, notional_usd)
    }

    /// Dispatch both legs concurrently. Failures are reported per leg.
    pub async fn dispatch(&self, intent: OrderIntent) -> ExecutionReport {
        let long_order = intent.market_order(&intent.long_leg);
        let short_order = intent.market_order(&intent.short_leg);

        let (long_result, short_result) = tokio::join!(
            self.submit(intent.long_leg.venue, &long_order),
            self.submit(intent.short_leg.venue, &short_order),
        );

        let report = ExecutionReport {
            long: LegOutcome {
                leg: intent.long_leg.clone(),
                result: long_result,
            },
            short: LegOutcome {
                leg: intent.short_leg.clone(),
                result: short_result,
            },
            intent,
        };

        if report.fully_filled() {
            info!(
                sequence_id = report.intent.sequence_id,
                direction = %report.intent.direction,
                "Both legs accepted"
            );
        } else if report.is_unbalanced() {
            warn!(
                sequence_id = report.intent.sequence_id,
                direction = %report.intent.direction,
                "One leg failed - exposure left unbalanced until a later cycle compensates"
            );
        } else {
            error!(
                sequence_id = report.intent.sequence_id,
                direction = %report.intent.direction,
                "Both legs failed"
            );
        }

        report
    }

    /// Reserve an id, build and dispatch in one step.
    pub async fn execute(
        &self,
        opportunity: &ArbOpportunity,
        prices: LegPrices,
        notional_usd: Decimal,
    ) -> ExecutionReport {
        let intent = self.prepare(opportunity, prices, notional_usd);
        self.dispatch(intent).await
    }

    async fn submit(&self, venue: Venue, order: &MarketOrder) -> Result<OrderReceipt, VenueError> {
        let result = match tokio::time::timeout(
            self.order_timeout,
            self.sink(venue).submit_market_order(order),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(VenueError::rejected(
                venue,
                format!("no acknowledgement within {:?}", self.order_timeout),
            )),
        };

        match &result {
            Ok(receipt) => info!(
                %venue,
                client_order_id = %order.client_order_id,
                order_id = %receipt.order_id,
                side = %order.side,
                filled = %receipt.filled_quantity,
                avg_price = %receipt.average_price,
                "Leg accepted"
            ),
            Err(e) => error!(
                %venue,
                client_order_id = %order.client_order_id,
                side = %order.side,
                quantity = %order.quantity,
                error = %e,
                "Leg failed"
            ),
        }

        result
    }
}
