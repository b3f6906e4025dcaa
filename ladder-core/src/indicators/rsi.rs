//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//!
//! When the average loss is exactly zero the ratio is undefined, and so is
//! the RSI at that bar. It is not saturated at 100.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        rsi(&closes, self.period)
    }
}

/// Wilder-smoothed average gain and average loss, aligned to the input.
///
/// Seed at index `period`: simple means of the first `period` gains/losses.
/// Thereafter `avg[i] = (avg[i-1] * (period - 1) + term[i]) / period`, where
/// `term[i]` is the gain (or loss) of the change from `i-1` to `i`.
pub fn wilder_averages(values: &[f64], period: usize) -> (Vec<f64>, Vec<f64>) {
    let n = values.len();
    let mut avg_gain = vec![f64::NAN; n];
    let mut avg_loss = vec![f64::NAN; n];

    if period == 0 || n < period + 1 {
        return (avg_gain, avg_loss);
    }

    let change = |i: usize| values[i] - values[i - 1];

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for i in 1..=period {
        let ch = change(i);
        if ch.is_nan() {
            return (avg_gain, avg_loss);
        }
        if ch > 0.0 {
            gain_sum += ch;
        } else {
            loss_sum -= ch;
        }
    }

    let p = period as f64;
    let mut g = gain_sum / p;
    let mut l = loss_sum / p;
    avg_gain[period] = g;
    avg_loss[period] = l;

    for i in (period + 1)..n {
        let ch = change(i);
        if ch.is_nan() {
            break;
        }
        let gain = if ch > 0.0 { ch } else { 0.0 };
        let loss = if ch < 0.0 { -ch } else { 0.0 };
        g = (g * (p - 1.0) + gain) / p;
        l = (l * (p - 1.0) + loss) / p;
        avg_gain[i] = g;
        avg_loss[i] = l;
    }

    (avg_gain, avg_loss)
}

/// RSI of an arbitrary series.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let (avg_gain, avg_loss) = wilder_averages(values, period);
    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| compute_rsi(g, l))
        .collect()
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() || avg_loss == 0.0 {
        return f64::NAN;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
