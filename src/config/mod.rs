//! Configuration management for the spread arbitrage engine.
//!
//! Loads settings from `.env`, an optional `arb.toml`, and the process
//! environment (unprefixed keys such as `THRESHOLD` or `POSITION_SIZE_USD`).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::exchange::SizeConvention;

/// Venue environment selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[serde(alias = "mainnet-beta")]
    Mainnet,
    Devnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Devnet => "devnet",
        }
    }
}

/// Main application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Spread (percent) required to open a trade
    pub threshold: Decimal,
    /// Notional per leg in USD
    pub position_size_usd: Decimal,
    /// Per-venue USD cap in each direction
    pub max_position_size: Decimal,
    /// Signing credential, only required for live trading
    #[serde(default)]
    pub private_key: String,
    /// Venue gateway endpoint
    #[serde(default)]
    pub rpc_address: String,
    pub network: Network,

    /// Traded asset symbol
    #[serde(default = "default_asset")]
    pub asset: String,
    /// Gateway key of venue A (top-of-book venue)
    #[serde(default = "default_venue_a")]
    pub venue_a: String,
    /// Gateway key of venue B (entry-price venue)
    #[serde(default = "default_venue_b")]
    pub venue_b: String,
    #[serde(default = "default_venue_a_size_convention")]
    pub venue_a_size_convention: SizeConvention,
    #[serde(default = "default_venue_b_size_convention")]
    pub venue_b_size_convention: SizeConvention,

    /// Multiplier applied to the threshold when unwinding a capped side
    #[serde(default = "default_softened_threshold_factor")]
    pub softened_threshold_factor: Decimal,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Deadline for each venue read of a cycle
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Deadline for each order submission
    #[serde(default = "default_order_timeout_ms")]
    pub order_timeout_ms: u64,

    /// Taker fee charged by paper accounts
    #[serde(default = "default_paper_fee_rate")]
    pub paper_fee_rate: Decimal,
}

fn default_asset() -> String {
    "SOL".to_string()
}

fn default_venue_a() -> String {
    "mango".to_string()
}

fn default_venue_b() -> String {
    "drift".to_string()
}

fn default_venue_a_size_convention() -> SizeConvention {
    SizeConvention::Units
}

fn default_venue_b_size_convention() -> SizeConvention {
    SizeConvention::NotionalUsd
}

fn default_softened_threshold_factor() -> Decimal {
    Decimal::new(2, 1) // 0.2
}

fn default_poll_interval_ms() -> u64 {
    4000
}

fn default_read_timeout_ms() -> u64 {
    3000
}

fn default_order_timeout_ms() -> u64 {
    10_000
}

fn default_paper_fee_rate() -> Decimal {
    crate::exchange::paper::default_fee_rate()
}

impl Config {
    /// Load configuration from `.env`, `arb.toml` and the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_environment(config::Environment::default())
    }

    /// Build from an explicit environment source.
    pub fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("arb").required(false))
            .add_source(environment)
            .build()
            .context("Failed to build configuration")?;

        config.try_deserialize().context(
            "Failed to deserialize configuration \
             (THRESHOLD, POSITION_SIZE_USD, MAX_POSITION_SIZE and NETWORK are required)",
        )
    }

    /// Validate configuration values.
    pub fn validate(&self, live: bool) -> Result<()> {
        anyhow::ensure!(self.threshold > Decimal::ZERO, "THRESHOLD must be positive");
        anyhow::ensure!(
            self.position_size_usd > Decimal::ZERO,
            "POSITION_SIZE_USD must be positive"
        );
        anyhow::ensure!(
            self.max_position_size > Decimal::ZERO,
            "MAX_POSITION_SIZE must be positive"
        );
        anyhow::ensure!(
            self.softened_threshold_factor > Decimal::ZERO
                && self.softened_threshold_factor <= Decimal::ONE,
            "SOFTENED_THRESHOLD_FACTOR must be in (0, 1]"
        );
        anyhow::ensure!(self.poll_interval_ms > 0, "POLL_INTERVAL_MS must be > 0");
        anyhow::ensure!(!self.asset.is_empty(), "ASSET must not be empty");
        anyhow::ensure!(
            self.venue_a != self.venue_b,
            "VENUE_A and VENUE_B must name different venues"
        );
        anyhow::ensure!(
            !self.rpc_address.is_empty(),
            "RPC_ADDRESS is required to read venue market data"
        );

        if live {
            anyhow::ensure!(
                !self.private_key.is_empty(),
                "PRIVATE_KEY is required for live trading"
            );
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn order_timeout(&self) -> Duration {
        Duration::from_millis(self.order_timeout_ms)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let private_key = if self.private_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };

        f.debug_struct("Config")
            .field("threshold", &self.threshold)
            .field("position_size_usd", &self.position_size_usd)
            .field("max_position_size", &self.max_position_size)
            .field("private_key", &private_key)
            .field("rpc_address", &self.rpc_address)
            .field("network", &self.network)
            .field("asset", &self.asset)
            .field("venue_a", &self.venue_a)
            .field("venue_b", &self.venue_b)
            .field("venue_a_size_convention", &self.venue_a_size_convention)
            .field("venue_b_size_convention", &self.venue_b_size_convention)
            .field("softened_threshold_factor", &self.softened_threshold_factor)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("order_timeout_ms", &self.order_timeout_ms)
            .field("paper_fee_rate", &self.paper_fee_rate)
            .finish()
    }
}
