//! Shared utilities for the rebalance keeper workspace.

use alloy::primitives::U256;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Price of token0 in token1 at `tick` (1.0001^tick), before decimal adjustment.
pub fn tick_to_price(tick: i32) -> f64 {
    1.0001_f64.powi(tick)
}

/// Converts a Q64.96 square-root price into a token1-per-token0 price,
/// adjusted for the token decimals.
///
/// Values above `u128::MAX` are truncated; this is acceptable for f64 precision.
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> f64 {
    let q96 = 2_f64.powi(96);
    let sqrt_price = sqrt_price_x96.saturating_to::<u128>() as f64 / q96;
    let scale = 10_f64.powi(i32::from(decimals0) - i32::from(decimals1));
    sqrt_price * sqrt_price * scale
}
