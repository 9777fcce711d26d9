//! One evaluation cycle of the arbitrage engine.
//!
//! A cycle reads both venues concurrently, waits for all five reads, then:
//! 1. normalizes positions into net exposure
//! 2. computes both directional spreads
//! 3. applies the threshold policy
//! 4. dispatches at most one two-legged intent
//!
//! A cycle never fails: every venue error becomes a [`CycleOutcome`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::coordinator::{ExecutionCoordinator, ExecutionReport, SequenceCounter};
use super::exposure::{ExposureAggregator, NetExposure, PricedPosition};
use super::policy::{GateOutcome, PolicyDecision, ThresholdPolicy};
use super::scheduler::{PollTask, SchedulerStats};
use super::spread::{SpreadEvaluator, Spreads};
use crate::config::Config;
use crate::exchange::{Direction, EntryPriceEstimate, Position, Quote, VenueError, VenueHandle};
use crate::report;
use crate::utils::decimal::{mid, safe_div};

/// Per-cycle trading parameters.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub asset: String,
    pub position_size_usd: Decimal,
    pub read_timeout: Duration,
}

/// Everything read from the venues in one cycle.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub quote_a: Quote,
    pub b_long: EntryPriceEstimate,
    pub b_short: EntryPriceEstimate,
    pub position_a: Position,
    pub position_b: Position,
}

impl MarketSnapshot {
    /// Price used to express venue A positions in units.
    pub fn reference_price_a(&self) -> Decimal {
        mid(self.quote_a.best_bid, self.quote_a.best_ask)
    }

    /// Price used to express venue B positions in units.
    pub fn reference_price_b(&self) -> Decimal {
        mid(self.b_long.price, self.b_short.price)
    }

    pub fn priced_a(&self) -> PricedPosition<'_> {
        PricedPosition::new(&self.position_a, self.reference_price_a())
    }

    pub fn priced_b(&self) -> PricedPosition<'_> {
        PricedPosition::new(&self.position_b, self.reference_price_b())
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.position_a.unrealized_pnl + self.position_b.unrealized_pnl
    }

    /// Fees paid on both venues so far.
    pub fn fees_paid(&self) -> Decimal {
        self.position_a.fees_paid + self.position_b.fees_paid
    }
}

/// Derived view of a completed read phase.
#[derive(Debug, Clone)]
pub struct CycleSnapshot {
    pub market: MarketSnapshot,
    pub spreads: Spreads,
    pub exposure: NetExposure,
    pub decision: PolicyDecision,
}

/// How a cycle ended.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// One or more reads failed; nothing was evaluated
    Skipped { errors: Vec<VenueError> },
    /// No gate cleared its threshold
    Idle { snapshot: Box<CycleSnapshot> },
    /// A gate cleared its threshold but a leg was capped
    CapacityExceeded { snapshot: Box<CycleSnapshot> },
    /// An intent was dispatched
    Traded {
        snapshot: Box<CycleSnapshot>,
        report: Box<ExecutionReport>,
    },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Skipped { .. } => "skipped",
            CycleOutcome::Idle { .. } => "idle",
            CycleOutcome::CapacityExceeded { .. } => "capacity_exceeded",
            CycleOutcome::Traded { .. } => "traded",
        }
    }

    pub fn execution(&self) -> Option<&ExecutionReport> {
        match self {
            CycleOutcome::Traded { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Option<&CycleSnapshot> {
        match self {
            CycleOutcome::Skipped { .. } => None,
            CycleOutcome::Idle { snapshot }
            | CycleOutcome::CapacityExceeded { snapshot }
            | CycleOutcome::Traded { snapshot, .. } => Some(snapshot),
        }
    }
}

/// The arbitrage decision and execution engine for one venue pair.
pub struct ArbEngine {
    venue_a: VenueHandle,
    venue_b: VenueHandle,
    evaluator: SpreadEvaluator,
    aggregator: ExposureAggregator,
    policy: ThresholdPolicy,
    coordinator: ExecutionCoordinator,
    settings: EngineSettings,
}

impl ArbEngine {
    pub fn new(
        venue_a: VenueHandle,
        venue_b: VenueHandle,
        policy: ThresholdPolicy,
        coordinator: ExecutionCoordinator,
        settings: EngineSettings,
    ) -> Self {
        Self {
            venue_a,
            venue_b,
            evaluator: SpreadEvaluator::new(),
            aggregator: ExposureAggregator::new(),
            policy,
            coordinator,
            settings,
        }
    }

    /// Wire an engine from configuration.
    pub fn from_config(
        config: &Config,
        venue_a: VenueHandle,
        venue_b: VenueHandle,
        sequence: SequenceCounter,
    ) -> Self {
        let policy = ThresholdPolicy::new(
            config.threshold,
            config.max_position_size,
            config.softened_threshold_factor,
        );
        let coordinator = ExecutionCoordinator::new(
            &config.asset,
            venue_a.orders.clone(),
            venue_b.orders.clone(),
            sequence,
            config.order_timeout(),
        );
        let settings = EngineSettings {
            asset: config.asset.clone(),
            position_size_usd: config.position_size_usd,
            read_timeout: config.read_timeout(),
        };

        Self::new(venue_a, venue_b, policy, coordinator, settings)
    }

    pub fn sequence(&self) -> &SequenceCounter {
        self.coordinator.sequence()
    }

    /// Read quotes and positions from both venues concurrently.
    ///
    /// Returns every failure when any read fails; partial data is discarded.
    pub async fn fetch_snapshot(&self) -> Result<MarketSnapshot, Vec<VenueError>> {
        let deadline = self.settings.read_timeout;
        let size = self.settings.position_size_usd;
        let asset = self.settings.asset.as_str();
        let (a, b) = (self.venue_a.venue, self.venue_b.venue);

        let (quote_a, b_long, b_short, position_a, position_b) = tokio::join!(
            bounded(deadline, self.venue_a.quotes.best_bid_ask(), || {
                VenueError::market_data(a, "quote timed out")
            }),
            bounded(deadline, self.venue_b.quotes.entry_price(Direction::Long, size), || {
                VenueError::market_data(b, "long entry price timed out")
            }),
            bounded(deadline, self.venue_b.quotes.entry_price(Direction::Short, size), || {
                VenueError::market_data(b, "short entry price timed out")
            }),
            bounded(deadline, self.venue_a.positions.position(asset), || {
                VenueError::account(a, "position timed out")
            }),
            bounded(deadline, self.venue_b.positions.position(asset), || {
                VenueError::account(b, "position timed out")
            }),
        );

        match (quote_a, b_long, b_short, position_a, position_b) {
            (Ok(quote_a), Ok(b_long), Ok(b_short), Ok(position_a), Ok(position_b)) => {
                Ok(MarketSnapshot {
                    quote_a,
                    b_long,
                    b_short,
                    position_a,
                    position_b,
                })
            }
            (quote_a, b_long, b_short, position_a, position_b) => {
                let errors = [
                    quote_a.err(),
                    b_long.err(),
                    b_short.err(),
                    position_a.err(),
                    position_b.err(),
                ]
                .into_iter()
                .flatten()
                .collect();
                Err(errors)
            }
        }
    }

    /// Evaluate a market snapshot without trading.
    pub fn evaluate(&self, market: MarketSnapshot) -> CycleSnapshot {
        let exposure = self.aggregator.combine(market.priced_a(), market.priced_b());
        let spreads = self
            .evaluator
            .evaluate(&market.quote_a, &market.b_long, &market.b_short);
        let headroom = self.policy.headroom(market.priced_a(), market.priced_b());
        let decision = self.policy.decide(&spreads, &headroom);

        CycleSnapshot {
            market,
            spreads,
            exposure,
            decision,
        }
    }

    /// Run one full cycle.
    #[instrument(
        skip(self),
        name = "arb_cycle",
        fields(asset = %self.settings.asset, sequence = self.sequence().peek())
    )]
    pub async fn run_cycle(&self) -> CycleOutcome {
        let market = match self.fetch_snapshot().await {
            Ok(market) => market,
            Err(errors) => {
                for e in &errors {
                    warn!(
                        venue = %e.venue(),
                        kind = e.kind(),
                        error = %e,
                        "Venue read failed, skipping cycle"
                    );
                }
                return CycleOutcome::Skipped { errors };
            }
        };

        let snapshot = self.evaluate(market);
        report::log_snapshot(&snapshot);
        self.check_imbalance(&snapshot);

        let Some(opportunity) = snapshot.decision.selected.clone() else {
            let capped = self.log_declines(&snapshot.decision);
            let snapshot = Box::new(snapshot);
            return if capped {
                CycleOutcome::CapacityExceeded { snapshot }
            } else {
                debug!("No spread above threshold");
                CycleOutcome::Idle { snapshot }
            };
        };

        let prices = self.evaluator.leg_prices(
            opportunity.direction,
            &snapshot.market.quote_a,
            &snapshot.market.b_long,
            &snapshot.market.b_short,
        );
        let intent = self
            .coordinator
            .prepare(&opportunity, prices, self.settings.position_size_usd);
        report::log_trade_intent(&intent);

        let execution = self.coordinator.dispatch(intent).await;

        CycleOutcome::Traded {
            snapshot: Box::new(snapshot),
            report: Box::new(execution),
        }
    }

    /// Log gates blocked by a position cap. Returns whether any were.
    fn log_declines(&self, decision: &PolicyDecision) -> bool {
        let declines = decision.capacity_declines();
        for (direction, outcome) in &declines {
            if let GateOutcome::CapacityExceeded {
                spread_pct,
                venue,
                side,
            } = outcome
            {
                info!(
                    %direction,
                    %venue,
                    %side,
                    spread_pct = %spread_pct.round_dp(4),
                    "Capacity exceeded, not trading this direction"
                );
            }
        }
        !declines.is_empty()
    }

    /// Warn when net exposure exceeds one leg, which means a leg went unfilled.
    fn check_imbalance(&self, snapshot: &CycleSnapshot) {
        let one_leg_units = safe_div(
            self.settings.position_size_usd,
            snapshot.market.reference_price_b(),
        );
        if !snapshot.exposure.is_balanced(one_leg_units) {
            warn!(
                net_units = %snapshot.exposure.signed_size_units.round_dp(4),
                one_leg_units = %one_leg_units.round_dp(4),
                "Net exposure exceeds one leg - positions are unbalanced"
            );
        }
    }
}

#[async_trait]
impl PollTask for ArbEngine {
    type Outcome = CycleOutcome;
    type Stats = SchedulerStats;

    async fn poll(&mut self) -> CycleOutcome {
        self.run_cycle().await
    }

    fn record(stats: &mut SchedulerStats, outcome: &CycleOutcome) {
        stats.record(outcome);
    }

    fn label(outcome: &CycleOutcome) -> &'static str {
        outcome.label()
    }
}

/// Await `fut`, mapping an elapsed deadline to `on_timeout()`.
async fn bounded<T, F>(
    deadline: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> VenueError,
) -> Result<T, VenueError>
where
    F: Future<Output = Result<T, VenueError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
