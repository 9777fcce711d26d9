//! Fixed-interval polling loop shared by the arbitrage engine and the
//! liquidation scanner.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::engine::CycleOutcome;

/// Work performed once per scheduler tick.
#[async_trait]
pub trait PollTask: Send {
    type Outcome: Send;
    type Stats: Default + Send;

    async fn poll(&mut self) -> Self::Outcome;

    /// Fold one outcome into the running counters.
    fn record(stats: &mut Self::Stats, outcome: &Self::Outcome);

    fn label(outcome: &Self::Outcome) -> &'static str;
}

/// Counters accumulated over the engine's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub skipped: u64,
    pub idle: u64,
    pub capacity_exceeded: u64,
    pub traded: u64,
    pub unbalanced: u64,
    /// Fees both venues reported at the last evaluated cycle
    pub fees_paid: Decimal,
}

impl SchedulerStats {
    pub fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        if let Some(snapshot) = outcome.snapshot() {
            self.fees_paid = snapshot.market.fees_paid();
        }
        match outcome {
            CycleOutcome::Skipped { .. } => self.skipped += 1,
            CycleOutcome::Idle { .. } => self.idle += 1,
            CycleOutcome::CapacityExceeded { .. } => self.capacity_exceeded += 1,
            CycleOutcome::Traded { report, .. } => {
                self.traded += 1;
                if report.is_unbalanced() {
                    self.unbalanced += 1;
                }
            }
        }
    }
}

/// Runs one task poll per tick.
///
/// Polls never overlap: a tick that fires while a poll is still running is
/// skipped rather than queued.
pub struct PollScheduler<T: PollTask> {
    task: T,
    period: Duration,
    cycles: u64,
    stats: T::Stats,
}

impl<T: PollTask> PollScheduler<T> {
    pub fn new(task: T, period: Duration) -> Self {
        Self {
            task,
            period,
            cycles: 0,
            stats: T::Stats::default(),
        }
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn stats(&self) -> &T::Stats {
        &self.stats
    }

    /// Run a single poll immediately.
    pub async fn run_once(&mut self) -> T::Outcome {
        let outcome = self.task.poll().await;
        T::record(&mut self.stats, &outcome);
        self.cycles += 1;
        debug!(outcome = T::label(&outcome), cycles = self.cycles, "Cycle complete");
        outcome
    }

    /// Poll until `shutdown` flips to true or its sender is dropped.
    ///
    /// Shutdown is only observed between polls; an in-flight poll always
    /// finishes, including any dispatched orders.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> T::Stats {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_ms = self.period.as_millis() as u64, "Polling started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown channel closed");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        info!(cycles = self.cycles, "Polling stopped");
        self.stats
    }
}
