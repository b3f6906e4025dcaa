//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper: middle + k * stddev(close, period)
//! - Lower: middle - k * stddev(close, period)
//!
//! Uses the sample stddev (ddof = 1), so the bands need `period >= 2`.
//! Lookback: period - 1.

use super::sma::sma;
use super::volatility::sample_std;
use super::Indicator;
use crate::domain::Bar;

/// The three aligned band series.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub mid: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Compute all three bands at once.
pub fn bollinger_bands(values: &[f64], period: usize, k: f64) -> BollingerBands {
    let n = values.len();
    let mid = sma(values, period);
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];

    if period <= 1 || n < period {
        return BollingerBands { mid, upper, lower };
    }

    for i in (period - 1)..n {
        if mid[i].is_nan() {
            continue;
        }
        let sd = sample_std(&values[i + 1 - period..=i]);
        upper[i] = mid[i] + k * sd;
        lower[i] = mid[i] - k * sd;
    }

    BollingerBands { mid, upper, lower }
}

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

/// Single-band view over [`bollinger_bands`] for the [`Indicator`] trait.
#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    fn with_band(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Upper)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Middle)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::with_band(period, multiplier, BollingerBand::Lower)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let bands = bollinger_bands(&closes, self.period, self.multiplier);
        match self.band {
            BollingerBand::Upper => bands.upper,
            BollingerBand::Middle => bands.mid,
            BollingerBand::Lower => bands.lower,
        }
    }
}
