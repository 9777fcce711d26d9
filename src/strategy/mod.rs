//! Spread arbitrage strategy.
//!
//! Contains the core logic for:
//! - Directional spread computation from quotes and entry prices
//! - Net exposure across both venues
//! - Threshold gating with position caps and a softened unwind threshold
//! - Two-legged order dispatch
//! - The per-cycle engine and its polling scheduler
//! - Liquidation scanning of venue accounts

mod coordinator;
mod engine;
mod exposure;
mod liquidation;
mod policy;
mod scheduler;
mod spread;

pub use coordinator::{
    ExecutionCoordinator, ExecutionReport, LegOutcome, OrderIntent, OrderLeg, SequenceCounter,
};
pub use engine::{ArbEngine, CycleOutcome, CycleSnapshot, EngineSettings, MarketSnapshot};
pub use exposure::{ExposureAggregator, NetExposure, PricedPosition};
pub use liquidation::{LiquidationScanner, LiquidationStats, ScanReport};
pub use policy::{ArbOpportunity, GateOutcome, Headroom, PolicyDecision, ThresholdPolicy};
pub use scheduler::{PollScheduler, PollTask, SchedulerStats};
pub use spread::{ArbDirection, LegPrices, SpreadEvaluator, Spreads};
