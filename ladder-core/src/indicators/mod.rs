//! Indicator library.
//!
//! Every indicator is a pure function from one or more price series to a
//! derived series of the same length. Entries before sufficient history are
//! `f64::NAN` ("undefined"), never zero. A zero period or a series that is too
//! short yields an all-NaN series of the input length.
//!
//! The single-series indicators also implement [`Indicator`] so callers that
//! hold a `&[Bar]` can compute them by name.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;
pub mod volatility;

pub use atr::{atr, true_range, Atr};
pub use bollinger::{bollinger_bands, Bollinger, BollingerBand, BollingerBands};
pub use ema::{ema, Ema};
pub use rsi::{rsi, wilder_averages, Rsi};
pub use sma::{sma, Sma};
pub use volatility::{rolling_quantiles, rolling_std_returns, sample_std};

use crate::domain::Bar;

/// Trait for indicators computed over a bar series.
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Index of the first defined output value.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Last value of a series, if it is defined.
pub fn last_defined(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| !v.is_nan())
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 13, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                base + chrono::Duration::minutes(5 * i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_defined_skips_nan_tail() {
        assert_eq!(last_defined(&[1.0, 2.0]), Some(2.0));
        assert_eq!(last_defined(&[1.0, f64::NAN]), None);
        assert_eq!(last_defined(&[]), None);
    }

    #[test]
    fn indicators_do_not_look_ahead() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 4.0).collect();
        let bars = make_bars(&closes);
        let truncated = &bars[..40];

        let indicators: Vec<Box<dyn Indicator>> = vec![
            Box::new(Sma::new(5)),
            Box::new(Ema::new(9)),
            Box::new(Atr::new(14)),
            Box::new(Rsi::new(14)),
            Box::new(Bollinger::upper(20, 2.0)),
        ];
        for ind in &indicators {
            let full = ind.compute(&bars);
            let part = ind.compute(truncated);
            for i in 0..truncated.len() {
                if part[i].is_nan() {
                    assert!(full[i].is_nan(), "{} diverged at {i}", ind.name());
                } else {
                    assert_approx(full[i], part[i], DEFAULT_EPSILON);
                }
            }
        }
    }
}
