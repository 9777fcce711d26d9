//! Perp Spread Arb - Main Entry Point
//!
//! Paper trading by default; `run --live` sends real orders through the
//! venue gateway. `liquidate` scans venue B accounts, submitting only with
//! `--live`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use perp_spread_arb::config::Config;
use perp_spread_arb::exchange::{
    GatewayClient, GatewayConfig, LiquidationSink, PaperAccount, SizeConvention, Venue,
    VenueHandle,
};
use perp_spread_arb::report;
use perp_spread_arb::strategy::{
    ArbEngine, LiquidationScanner, PollScheduler, PollTask, SequenceCounter,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Perp Spread Arb CLI
#[derive(Parser)]
#[command(name = "perp-spread-arb")]
#[command(version, about = "Two-venue perpetual futures spread arbitrage")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll both venues and trade spreads above the threshold
    Run {
        /// Submit real orders instead of paper fills
        #[arg(long)]
        live: bool,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Scan venue B accounts and liquidate the unhealthy ones
    Liquidate {
        /// Submit liquidations instead of only reporting candidates
        #[arg(long)]
        live: bool,

        /// Run a single scan and exit
        #[arg(long)]
        once: bool,
    },

    /// Load and validate configuration, then print it with secrets redacted
    CheckConfig {
        /// Validate live-mode requirements too
        #[arg(long)]
        live: bool,
    },
}

/// Trading mode: Live (real orders) or Paper (simulated fills).
#[derive(Debug, Clone, Copy, PartialEq)]
enum TradingMode {
    Live,
    Paper,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let (live, once) = match cli.command {
        Some(Commands::CheckConfig { live }) => return check_config(live),
        Some(Commands::Liquidate { live, once }) => return liquidate(live, once).await,
        Some(Commands::Run { live, once }) => (live, once),
        None => (false, false),
    };

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║          Perp Spread Arb v{} - Spread Arbitrage          ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let mode = if live {
        warn!("⚠️  LIVE TRADING MODE - Real money at risk!");
        TradingMode::Live
    } else {
        info!("📝 PAPER TRADING MODE - Simulated fills over live quotes");
        TradingMode::Paper
    };

    let config = Config::load().context("Failed to load configuration")?;
    config
        .validate(mode == TradingMode::Live)
        .context("Invalid configuration")?;
    log_config(&config, mode);

    let client_a = Arc::new(gateway_client(&config, Venue::A)?);
    let client_b = Arc::new(gateway_client(&config, Venue::B)?);
    info!(
        venue_a = %config.venue_a,
        venue_b = %config.venue_b,
        account = %client_a.account_id(),
        "Gateway clients ready"
    );

    let mut paper_accounts = Vec::new();
    let (venue_a, venue_b) = match mode {
        TradingMode::Live => (
            VenueHandle::from_client(Venue::A, client_a),
            VenueHandle::from_client(Venue::B, client_b),
        ),
        TradingMode::Paper => {
            let paper_a = Arc::new(PaperAccount::new(
                Venue::A,
                &config.asset,
                client_a.clone(),
                config.venue_a_size_convention,
                config.paper_fee_rate,
            ));
            let paper_b = Arc::new(PaperAccount::new(
                Venue::B,
                &config.asset,
                client_b.clone(),
                config.venue_b_size_convention,
                config.paper_fee_rate,
            ));
            paper_accounts.push(paper_a.clone());
            paper_accounts.push(paper_b.clone());
            (
                VenueHandle::new(Venue::A, client_a, paper_a.clone(), paper_a),
                VenueHandle::new(Venue::B, client_b, paper_b.clone(), paper_b),
            )
        }
    };

    let engine = ArbEngine::from_config(&config, venue_a, venue_b, SequenceCounter::new());
    let mut scheduler = PollScheduler::new(engine, config.poll_interval());

    if once {
        let outcome = scheduler.run_once().await;
        info!(outcome = outcome.label(), "Single cycle complete");
        report::log_stats(scheduler.stats());
        log_paper_accounts(&paper_accounts).await;
        return Ok(());
    }

    let stats = scheduler.run(shutdown_on_ctrl_c()).await;
    report::log_stats(&stats);
    log_paper_accounts(&paper_accounts).await;

    info!("👋 Perp Spread Arb shutdown complete");
    Ok(())
}

/// Run the liquidation scanner against venue B.
async fn liquidate(live: bool, once: bool) -> Result<()> {
    if live {
        warn!("⚠️  LIVE LIQUIDATION MODE - Transactions will be submitted!");
    } else {
        info!("📝 DRY RUN - Liquidatable accounts are only reported");
    }

    let config = Config::load().context("Failed to load configuration")?;
    config.validate(live).context("Invalid configuration")?;
    info!("📋 Liquidating on {} ({})", config.venue_b, config.network.as_str());

    let client = Arc::new(gateway_client(&config, Venue::B)?);
    let sink = live.then(|| client.clone() as Arc<dyn LiquidationSink>);
    let scanner = LiquidationScanner::new(
        Venue::B,
        client,
        sink,
        config.read_timeout(),
        config.order_timeout(),
    );
    let mut scheduler = PollScheduler::new(scanner, config.poll_interval());

    if once {
        let outcome = scheduler.run_once().await;
        info!(outcome = LiquidationScanner::label(&outcome), "Single scan complete");
        report::log_liquidation_stats(scheduler.stats());
        return Ok(());
    }

    let stats = scheduler.run(shutdown_on_ctrl_c()).await;
    report::log_liquidation_stats(&stats);

    info!("👋 Liquidation scanner shutdown complete");
    Ok(())
}

/// Flip the returned receiver to true on ctrl-c.
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Shutdown signal received, finishing current cycle...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });
    shutdown_rx
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "perp-spread-arb.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the whole process
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("perp_spread_arb=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

fn gateway_client(config: &Config, venue: Venue) -> Result<GatewayClient> {
    let (venue_key, size_convention): (&str, SizeConvention) = match venue {
        Venue::A => (config.venue_a.as_str(), config.venue_a_size_convention),
        Venue::B => (config.venue_b.as_str(), config.venue_b_size_convention),
    };

    GatewayClient::new(
        venue,
        &config.asset,
        GatewayConfig {
            base_url: config.rpc_address.clone(),
            venue_key: venue_key.to_string(),
            network: config.network,
            private_key: config.private_key.clone(),
            size_convention,
            timeout: config.read_timeout().max(config.order_timeout()),
        },
    )
    .with_context(|| format!("Failed to create gateway client for {}", venue))
}

fn check_config(live: bool) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate(live).context("Invalid configuration")?;
    println!("{:#?}", config);
    println!("✅ Configuration valid");
    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config, mode: TradingMode) {
    info!("📋 Configuration:");
    info!("   Mode: {:?}", mode);
    info!("   Network: {}", config.network.as_str());
    info!("   Asset: {}", config.asset);
    info!("   Venue A: {} ({:?})", config.venue_a, config.venue_a_size_convention);
    info!("   Venue B: {} ({:?})", config.venue_b, config.venue_b_size_convention);
    info!("   Threshold: {}%", config.threshold);
    info!(
        "   Softened Threshold: {}%",
        config.threshold * config.softened_threshold_factor
    );
    info!("   Position Size: ${}", config.position_size_usd);
    info!("   Max Position Size: ${}", config.max_position_size);
    info!("   Poll Interval: {}ms", config.poll_interval_ms);
}

async fn log_paper_accounts(accounts: &[Arc<PaperAccount>]) {
    for account in accounts {
        let state = account.state().await;
        info!(
            venue = %account.venue(),
            units = %state.units,
            entry_price = %state.entry_price,
            realized_pnl = %state.realized_pnl.round_dp(4),
            fees = %state.total_fees.round_dp(4),
            orders = state.order_count,
            "📊 Paper account"
        );
    }
}
