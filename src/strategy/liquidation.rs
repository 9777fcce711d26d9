//! Liquidation scanner for the entry-price venue.
//!
//! Each poll lists every user account on the venue, remembers which ones it
//! has seen, and submits a liquidation for each account the venue reports as
//! liquidatable. Without a sink the scanner only reports candidates.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use super::scheduler::PollTask;
use crate::exchange::{AccountDirectory, LiquidationReceipt, LiquidationSink, Venue, VenueError};

/// Result of one pass over the account list.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub accounts: usize,
    pub new_accounts: usize,
    /// Accounts flagged as liquidatable this pass
    pub candidates: Vec<String>,
    pub liquidated: Vec<LiquidationReceipt>,
    pub failed: Vec<VenueError>,
}

impl ScanReport {
    pub fn label(&self) -> &'static str {
        if !self.failed.is_empty() {
            "liquidation_failed"
        } else if !self.liquidated.is_empty() {
            "liquidated"
        } else if !self.candidates.is_empty() {
            "candidates"
        } else {
            "idle"
        }
    }
}

/// Counters accumulated over the scanner's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidationStats {
    pub scans: u64,
    pub failed_scans: u64,
    pub known_accounts: u64,
    pub candidates: u64,
    pub liquidated: u64,
    pub failed_liquidations: u64,
}

impl LiquidationStats {
    pub fn record(&mut self, outcome: &Result<ScanReport, VenueError>) {
        self.scans += 1;
        match outcome {
            Ok(report) => {
                self.known_accounts += report.new_accounts as u64;
                self.candidates += report.candidates.len() as u64;
                self.liquidated += report.liquidated.len() as u64;
                self.failed_liquidations += report.failed.len() as u64;
            }
            Err(_) => self.failed_scans += 1,
        }
    }
}

/// Polls one venue's accounts and liquidates the unhealthy ones.
pub struct LiquidationScanner {
    venue: Venue,
    directory: Arc<dyn AccountDirectory>,
    sink: Option<Arc<dyn LiquidationSink>>,
    read_timeout: Duration,
    liquidate_timeout: Duration,
    known: HashSet<String>,
}

impl LiquidationScanner {
    /// `sink = None` reports candidates without submitting anything.
    pub fn new(
        venue: Venue,
        directory: Arc<dyn AccountDirectory>,
        sink: Option<Arc<dyn LiquidationSink>>,
        read_timeout: Duration,
        liquidate_timeout: Duration,
    ) -> Self {
        Self {
            venue,
            directory,
            sink,
            read_timeout,
            liquidate_timeout,
            known: HashSet::new(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.sink.is_none()
    }

    /// Number of distinct accounts seen so far.
    pub fn known_accounts(&self) -> usize {
        self.known.len()
    }

    /// List accounts and liquidate every candidate concurrently.
    #[instrument(skip(self), name = "liquidation_scan", fields(venue = %self.venue))]
    pub async fn scan(&mut self) -> Result<ScanReport, VenueError> {
        let accounts = tokio::time::timeout(self.read_timeout, self.directory.accounts())
            .await
            .map_err(|_| VenueError::account(self.venue, "account list timed out"))??;

        let mut report = ScanReport {
            accounts: accounts.len(),
            ..ScanReport::default()
        };
        for account in &accounts {
            if self.known.insert(account.account_id.clone()) {
                report.new_accounts += 1;
            }
            if account.can_be_liquidated {
                report.candidates.push(account.account_id.clone());
            }
        }
        info!(
            accounts = report.accounts,
            new = report.new_accounts,
            candidates = report.candidates.len(),
            "User accounts scanned"
        );

        let Some(sink) = &self.sink else {
            for account_id in &report.candidates {
                info!(%account_id, "Liquidatable account (dry run, not submitted)");
            }
            return Ok(report);
        };

        let mut tasks = JoinSet::new();
        for account_id in report.candidates.clone() {
            let sink = Arc::clone(sink);
            let (venue, deadline) = (self.venue, self.liquidate_timeout);
            tasks.spawn(async move {
                match tokio::time::timeout(deadline, sink.liquidate(&account_id)).await {
                    Ok(result) => result,
                    Err(_) => Err(VenueError::rejected(
                        venue,
                        format!("liquidation of {} timed out", account_id),
                    )),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(VenueError::rejected(self.venue, format!("liquidation task failed: {}", e)))
            });
            match result {
                Ok(receipt) => {
                    info!(
                        account_id = %receipt.account_id,
                        tx_id = %receipt.tx_id,
                        "✅ Account liquidated"
                    );
                    report.liquidated.push(receipt);
                }
                Err(e) => {
                    warn!(error = %e, "Liquidation failed");
                    report.failed.push(e);
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl PollTask for LiquidationScanner {
    type Outcome = Result<ScanReport, VenueError>;
    type Stats = LiquidationStats;

    async fn poll(&mut self) -> Self::Outcome {
        let outcome = self.scan().await;
        if let Err(e) = &outcome {
            warn!(venue = %e.venue(), error = %e, "Account scan failed, retrying next tick");
        }
        outcome
    }

    fn record(stats: &mut LiquidationStats, outcome: &Self::Outcome) {
        stats.record(outcome);
    }

    fn label(outcome: &Self::Outcome) -> &'static str {
        match outcome {
            Ok(report) => report.label(),
            Err(_) => "scan_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{AccountHealth, MockAccountDirectory, MockLiquidationSink};
    use crate::strategy::PollScheduler;

    fn account(id: &str, can_be_liquidated: bool) -> AccountHealth {
        AccountHealth {
            account_id: id.to_string(),
            authority: format!("{}-owner", id),
            can_be_liquidated,
        }
    }

    fn directory(accounts: Vec<AccountHealth>) -> Arc<dyn AccountDirectory> {
        let mut directory = MockAccountDirectory::new();
        directory.expect_accounts().returning(move || Ok(accounts.clone()));
        Arc::new(directory)
    }

    fn receipt(account_id: &str) -> LiquidationReceipt {
        LiquidationReceipt {
            account_id: account_id.to_string(),
            tx_id: format!("tx-{}", account_id),
        }
    }

    fn scanner(
        directory: Arc<dyn AccountDirectory>,
        sink: Option<Arc<dyn LiquidationSink>>,
    ) -> LiquidationScanner {
        LiquidationScanner::new(
            Venue::B,
            directory,
            sink,
            Duration::from_secs(3),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_liquidates_only_flagged_accounts() {
        let mut sink = MockLiquidationSink::new();
        sink.expect_liquidate().times(1).returning(|id| {
            assert_eq!(id, "b");
            Ok(receipt(id))
        });

        let mut scanner = scanner(
            directory(vec![account("a", false), account("b", true), account("c", false)]),
            Some(Arc::new(sink)),
        );

        let report = scanner.scan().await.unwrap();

        assert_eq!(report.accounts, 3);
        assert_eq!(report.new_accounts, 3);
        assert_eq!(report.candidates, vec!["b".to_string()]);
        assert_eq!(report.liquidated, vec![receipt("b")]);
        assert!(report.failed.is_empty());
        assert_eq!(report.label(), "liquidated");
    }

    #[tokio::test]
    async fn test_new_accounts_counted_once() {
        let mut sink = MockLiquidationSink::new();
        sink.expect_liquidate().never();
        let accounts = vec![account("a", false), account("b", false)];
        let mut scanner = scanner(directory(accounts), Some(Arc::new(sink)));

        assert_eq!(scanner.scan().await.unwrap().new_accounts, 2);
        let second = scanner.scan().await.unwrap();
        assert_eq!(second.accounts, 2);
        assert_eq!(second.new_accounts, 0);
        assert_eq!(second.label(), "idle");
        assert_eq!(scanner.known_accounts(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_submitting() {
        let mut scanner = scanner(directory(vec![account("a", true), account("b", true)]), None);
        assert!(scanner.is_dry_run());

        let report = scanner.scan().await.unwrap();

        assert_eq!(report.candidates.len(), 2);
        assert!(report.liquidated.is_empty());
        assert_eq!(report.label(), "candidates");
    }

    #[tokio::test]
    async fn test_one_refusal_does_not_block_others() {
        let mut sink = MockLiquidationSink::new();
        sink.expect_liquidate().times(2).returning(|id| {
            if id == "a" {
                Err(VenueError::rejected(Venue::B, "account recovered"))
            } else {
                Ok(receipt(id))
            }
        });

        let mut scanner = scanner(
            directory(vec![account("a", true), account("b", true)]),
            Some(Arc::new(sink)),
        );

        let report = scanner.scan().await.unwrap();

        assert_eq!(report.liquidated, vec![receipt("b")]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].to_string().contains("account recovered"));
        assert_eq!(report.label(), "liquidation_failed");
    }

    #[tokio::test]
    async fn test_directory_failure_is_returned() {
        let mut directory = MockAccountDirectory::new();
        directory
            .expect_accounts()
            .returning(|| Err(VenueError::account(Venue::B, "rpc unreachable")));
        let mut scanner = scanner(Arc::new(directory), None);

        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, VenueError::AccountUnavailable { venue: Venue::B, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_liquidation_times_out() {
        struct Stalled;

        #[async_trait]
        impl LiquidationSink for Stalled {
            async fn liquidate(&self, _account_id: &str) -> Result<LiquidationReceipt, VenueError> {
                std::future::pending().await
            }
        }

        let mut scanner = scanner(directory(vec![account("a", true)]), Some(Arc::new(Stalled)));

        let report = scanner.scan().await.unwrap();

        assert!(report.liquidated.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_scheduler_accumulates_scan_stats() {
        let mut calls = 0;
        let mut directory = MockAccountDirectory::new();
        directory.expect_accounts().times(3).returning(move || {
            calls += 1;
            match calls {
                1 => Ok(vec![account("a", false)]),
                2 => Err(VenueError::account(Venue::B, "rpc unreachable")),
                _ => Ok(vec![account("a", true), account("b", false)]),
            }
        });
        let mut sink = MockLiquidationSink::new();
        sink.expect_liquidate().times(1).returning(|id| Ok(receipt(id)));

        let mut scheduler = PollScheduler::new(
            scanner(Arc::new(directory), Some(Arc::new(sink))),
            Duration::from_secs(4),
        );
        for _ in 0..3 {
            scheduler.run_once().await;
        }

        let stats = scheduler.stats();
        assert_eq!(stats.scans, 3);
        assert_eq!(stats.failed_scans, 1);
        assert_eq!(stats.known_accounts, 2);
        assert_eq!(stats.candidates, 1);
        assert_eq!(stats.liquidated, 1);
        assert_eq!(scheduler.task().known_accounts(), 2);
    }
}
