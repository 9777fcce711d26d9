//! Human-readable cycle tables written to the log.

use rust_decimal::Decimal;
use tracing::info;

use crate::strategy::{CycleSnapshot, GateOutcome, LiquidationStats, OrderIntent, SchedulerStats};

fn gate_label(outcome: &GateOutcome) -> String {
    match outcome {
        GateOutcome::BelowThreshold {
            active_threshold, ..
        } => format!("below {:.4}%", active_threshold),
        GateOutcome::CapacityExceeded { venue, side, .. } => {
            format!("capped ({} {})", venue, side)
        }
        GateOutcome::Eligible {
            active_threshold, ..
        } => format!("eligible > {:.4}%", active_threshold),
    }
}

/// Log prices, spreads and exposure for one evaluated cycle.
pub fn log_snapshot(snapshot: &CycleSnapshot) {
    let market = &snapshot.market;
    let exposure = &snapshot.exposure;

    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║                    SPREAD SNAPSHOT                         ║");
    info!("╠════════════════════════════════════════════════════════════╣");
    info!(
        "║ {} bid/ask:        {:>12.4} / {:<12.4}",
        market.quote_a.venue, market.quote_a.best_bid, market.quote_a.best_ask
    );
    info!(
        "║ {} long/short:     {:>12.4} / {:<12.4}",
        market.b_long.venue, market.b_long.price, market.b_short.price
    );
    info!("╠════════════════════════════════════════════════════════════╣");
    info!(
        "║ Long B / Short A:   {:>9.4}%   {}",
        snapshot.spreads.long_b_short_a,
        gate_label(&snapshot.decision.long_b_short_a)
    );
    info!(
        "║ Short B / Long A:   {:>9.4}%   {}",
        snapshot.spreads.short_b_long_a,
        gate_label(&snapshot.decision.short_b_long_a)
    );
    info!("╠════════════════════════════════════════════════════════════╣");
    info!(
        "║ Net delta:          {:>12.4} {} ({:+.4} / {:+.4})",
        exposure.signed_size_units, exposure.asset, exposure.venue_a_units, exposure.venue_b_units
    );
    info!("║ Unrealized PnL:    ${:>12.2}", market.unrealized_pnl());
    info!("║ Fees Paid:         ${:>12.2}", market.fees_paid());
    info!("╚════════════════════════════════════════════════════════════╝");
}

/// Log an intent before its legs are dispatched.
pub fn log_trade_intent(intent: &OrderIntent) {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║ TRADE #{:<6} {:<20} spread {:>8.4}%",
        intent.sequence_id, intent.direction, intent.spread_pct
    );
    info!("╠════════════════════════════════════════════════════════════╣");
    for leg in intent.legs() {
        info!(
            "║ {:<8} {:<5} {:>12.4} {} @ {:>12.4} (${:.2})",
            leg.venue,
            leg.side(),
            leg.quantity,
            intent.asset,
            leg.reference_price,
            leg.notional_usd
        );
    }
    info!("╚════════════════════════════════════════════════════════════╝");
}

/// Log scheduler counters at shutdown.
pub fn log_stats(stats: &SchedulerStats) {
    let hit_rate = if stats.cycles == 0 {
        Decimal::ZERO
    } else {
        Decimal::from(stats.traded) * Decimal::ONE_HUNDRED / Decimal::from(stats.cycles)
    };

    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║                    SESSION SUMMARY                         ║");
    info!("╠════════════════════════════════════════════════════════════╣");
    info!("║    Cycles:             {:>6}", stats.cycles);
    info!("║    Skipped:            {:>6}", stats.skipped);
    info!("║    Idle:               {:>6}", stats.idle);
    info!("║    Capacity Exceeded:  {:>6}", stats.capacity_exceeded);
    info!("║    Traded:             {:>6} ({:.1}%)", stats.traded, hit_rate);
    info!("║    Unbalanced Fills:   {:>6}", stats.unbalanced);
    info!("║    Fees Paid:         ${:>10.2}", stats.fees_paid);
    info!("╚════════════════════════════════════════════════════════════╝");
}

/// Log liquidation scanner counters at shutdown.
pub fn log_liquidation_stats(stats: &LiquidationStats) {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║                  LIQUIDATION SUMMARY                       ║");
    info!("╠════════════════════════════════════════════════════════════╣");
    info!("║    Scans:              {:>6}", stats.scans);
    info!("║    Failed Scans:       {:>6}", stats.failed_scans);
    info!("║    Accounts Seen:      {:>6}", stats.known_accounts);
    info!("║    Candidates:         {:>6}", stats.candidates);
    info!("║    Liquidated:         {:>6}", stats.liquidated);
    info!("║    Failed:             {:>6}", stats.failed_liquidations);
    info!("╚════════════════════════════════════════════════════════════╝");
}
