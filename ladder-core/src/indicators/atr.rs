//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|), defined from index 1.
//! Seed: ATR[period] = mean(TR[1..=period]).
//! Then Wilder: ATR[t] = (ATR[t-1] * (period - 1) + TR[t]) / period.
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        atr(&high, &low, &close, self.period)
    }
}

/// True Range series. TR[0] is NaN: there is no previous close.
///
/// Inputs of unequal length produce an all-NaN series of `close.len()`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = close.len();
    let mut tr = vec![f64::NAN; n];
    if high.len() != n || low.len() != n {
        return tr;
    }

    for i in 1..n {
        let (h, l, pc) = (high[i], low[i], close[i - 1]);
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }
    tr
}

/// Wilder-smoothed ATR over high/low/close columns.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period + 1 {
        return result;
    }

    let tr = true_range(high, low, close);

    let seed_window = &tr[1..=period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    result[period] = seed;

    let p = period as f64;
    let mut prev = seed;
    for i in (period + 1)..n {
        if tr[i].is_nan() {
            for val in result.iter_mut().skip(i) {
                *val = f64::NAN;
            }
            return result;
        }
        let next = (prev * (p - 1.0) + tr[i]) / p;
        result[i] = next;
        prev = next;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::TimeZone;

    fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 13, 0, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| {
                Bar::new(
                    base + chrono::Duration::minutes(5 * i as i64),
                    open,
                    high,
                    low,
                    close,
                    1000.0,
                )
            })
            .collect()
    }

    #[test]
    fn true_range_basic() {
        let tr = true_range(
            &[105.0, 108.0, 107.0],
            &[95.0, 100.0, 98.0],
            &[102.0, 106.0, 99.0],
        );
        assert!(tr[0].is_nan());
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON); // max(8, |108-102|, |100-102|)
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON); // max(9, |107-106|, |98-106|)
    }

    #[test]
    fn true_range_gap_up() {
        // prev close 100, current bar 108..115
        let tr = true_range(&[102.0, 115.0], &[97.0, 108.0], &[100.0, 112.0]);
        assert_approx(tr[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0),   // TR = 6
            (101.0, 106.0, 100.0, 105.0), // TR = 6
        ]);
        let result = Atr::new(3).compute(&bars);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!(result[2].is_nan());
        // Seed: mean(8, 9, 6) = 23/3
        // ATR[4] = (23/3 * 2 + 6) / 3 = 64/9
        assert_approx(result[3], 23.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 64.0 / 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_needs_period_plus_one_bars() {
        let result = atr(&[2.0, 2.0, 2.0], &[1.0, 1.0, 1.0], &[1.5, 1.5, 1.5], 3);
        assert!(result.iter().all(|v| v.is_nan()));
        assert!(atr(&[2.0; 5], &[1.0; 5], &[1.5; 5], 0).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn atr_mismatched_columns_are_undefined() {
        let result = atr(&[2.0; 4], &[1.0; 3], &[1.5; 5], 2);
        assert_eq!(result.len(), 5);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(14).lookback(), 14);
    }
}
