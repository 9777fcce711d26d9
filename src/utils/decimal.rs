//! Decimal arithmetic utilities for price and spread calculations.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Safe division that returns zero if divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Signed percentage gain from buying at `cost` and selling at `proceeds`,
/// expressed relative to `base` (1.0 = 1%).
pub fn spread_pct(proceeds: Decimal, cost: Decimal, base: Decimal) -> Decimal {
    safe_div(proceeds - cost, base) * dec!(100)
}

/// Midpoint of two prices.
pub fn mid(a: Decimal, b: Decimal) -> Decimal {
    (a + b) / dec!(2)
}
