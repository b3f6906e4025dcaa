//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol at a single interval close.
///
/// A bar series is ordered by ascending `time` with no duplicate timestamps.
/// Indicators only read the five numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Violations of the price-series ordering contract.
#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("bar {index} at {time} is not after the previous bar")]
    OutOfOrder { index: usize, time: DateTime<Utc> },

    #[error("duplicate bar timestamp {time} at index {index}")]
    DuplicateTime { index: usize, time: DateTime<Utc> },
}

/// Check that a series is strictly ascending in time.
pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, curr) = (&pair[0], &pair[1]);
        if curr.time == prev.time {
            return Err(BarError::DuplicateTime {
                index: i + 1,
                time: curr.time,
            });
        }
        if curr.time < prev.time {
            return Err(BarError::OutOfOrder {
                index: i + 1,
                time: curr.time,
            });
        }
    }
    Ok(())
}

/// Close prices of a bar series.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// High prices of a bar series.
pub fn highs(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.high).collect()
}

/// Low prices of a bar series.
pub fn lows(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.low).collect()
}
