//! Market-data collaborators.
//!
//! A [`MarketData`] source returns OHLCV candles for one product at one
//! granularity, ascending by time. Three sources ship here:
//! 1. [`CoinbaseMarket`]: Coinbase Exchange public candles (no keys)
//! 2. [`CsvMarket`]: a local `time,open,high,low,close,volume` file
//! 3. [`SyntheticMarket`]: deterministic geometric random walk seeded from
//!    the product name
//!
//! [`FallbackMarket`] wraps a live source and serves synthetic candles when it
//! fails, so a dev loop keeps running offline.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use ladder_core::domain::{validate_series, Bar, BarError};

use crate::config::{MarketSettings, MarketSource};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("bad timestamp '{value}' in {path}")]
    BadTimestamp { path: PathBuf, value: String },

    #[error("invalid bar series: {0}")]
    Series(#[from] BarError),

    #[error("data error: {0}")]
    Other(String),
}

/// A candle source for the polling loop.
pub trait MarketData: Send + Sync {
    fn name(&self) -> &str;

    /// Candles for `product` at `granularity_secs`, ascending by time.
    fn candles(&self, product: &str, granularity_secs: u32) -> Result<Vec<Bar>, DataError>;
}

/// Build the source named by `settings`, wrapped in a synthetic fallback when
/// enabled.
pub fn build_market(settings: &MarketSettings) -> Result<Box<dyn MarketData>, DataError> {
    let synthetic = SyntheticMarket::new(settings.synthetic_bars);
    let live: Box<dyn MarketData> = match settings.source {
        MarketSource::Synthetic => return Ok(Box::new(synthetic)),
        MarketSource::Coinbase => Box::new(CoinbaseMarket::new(
            &settings.coinbase_url,
            Duration::from_secs(settings.timeout_secs),
        )?),
        MarketSource::Csv => {
            let path = settings
                .csv_path
                .clone()
                .ok_or_else(|| DataError::Other("market.csv_path is not set".into()))?;
            Box::new(CsvMarket::new(path))
        }
    };
    if settings.fallback_to_synthetic {
        Ok(Box::new(FallbackMarket::new(live, synthetic)))
    } else {
        Ok(live)
    }
}

// ── Synthetic ────────────────────────────────────────────────────────

const SYNTHETIC_START_PRICE: f64 = 30_000.0;
const SYNTHETIC_DRIFT: f64 = 0.0001;
const SYNTHETIC_SHOCK_SD: f64 = 0.01;

/// Geometric random walk with normal shocks.
///
/// The RNG is seeded from the product name, so a given product always yields
/// the same price path; only the timestamps follow the clock.
#[derive(Debug, Clone)]
pub struct SyntheticMarket {
    bars: usize,
    end: Option<DateTime<Utc>>,
}

impl SyntheticMarket {
    pub fn new(bars: usize) -> Self {
        Self { bars, end: None }
    }

    /// Pin the last candle's time instead of using the wall clock.
    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    fn generate(&self, product: &str, granularity_secs: u32) -> Result<Vec<Bar>, DataError> {
        let step = i64::from(granularity_secs.max(1));
        let end = self.end.unwrap_or_else(Utc::now).timestamp();
        let last = end - end.rem_euclid(step);
        let first = last - step * (self.bars as i64 - 1).max(0);

        let seed: [u8; 32] = *blake3::hash(product.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);
        let shock =
            Normal::new(0.0, SYNTHETIC_SHOCK_SD).map_err(|e| DataError::Other(e.to_string()))?;
        let volume = Normal::new(15.0, 5.0).map_err(|e| DataError::Other(e.to_string()))?;

        let mut price = SYNTHETIC_START_PRICE;
        let mut out = Vec::with_capacity(self.bars);
        for i in 0..self.bars {
            let ts = first + step * i as i64;
            let time = DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| DataError::Other(format!("timestamp out of range: {ts}")))?;

            price *= (SYNTHETIC_DRIFT + shock.sample(&mut rng)).exp();
            let open = price * (1.0 - rng.gen::<f64>() * 0.003);
            let close = price * (1.0 + rng.gen::<f64>() * 0.003);
            let high = open.max(close) * (1.0 + rng.gen::<f64>() * 0.002);
            let low = open.min(close) * (1.0 - rng.gen::<f64>() * 0.002);
            let vol: f64 = volume.sample(&mut rng);
            out.push(Bar::new(time, open, high, low, close, vol.abs()));
        }
        Ok(out)
    }
}

impl MarketData for SyntheticMarket {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn candles(&self, product: &str, granularity_secs: u32) -> Result<Vec<Bar>, DataError> {
        self.generate(product, granularity_secs)
    }
}

// ── CSV file ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Candles from a CSV file with a `time,open,high,low,close,volume` header.
///
/// `time` is either RFC 3339 or Unix seconds. Rows are sorted on load; the
/// product and granularity arguments are not interpreted.
#[derive(Debug, Clone)]
pub struct CsvMarket {
    path: PathBuf,
}

impl CsvMarket {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn csv_err(&self, source: csv::Error) -> DataError {
        DataError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

impl MarketData for CsvMarket {
    fn name(&self) -> &str {
        "csv"
    }

    fn candles(&self, product: &str, _granularity_secs: u32) -> Result<Vec<Bar>, DataError> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.csv_err(e))?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|e| self.csv_err(e))?;
            let time = parse_time(&row.time).ok_or_else(|| DataError::BadTimestamp {
                path: self.path.clone(),
                value: row.time.clone(),
            })?;
            bars.push(Bar::new(time, row.open, row.high, row.low, row.close, row.volume));
        }
        bars.sort_by_key(|b| b.time);
        validate_series(&bars)?;
        tracing::debug!(product, path = %self.path.display(), bars = bars.len(), "loaded csv candles");
        Ok(bars)
    }
}

/// RFC 3339 or integer Unix seconds.
fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

// ── Coinbase public REST ─────────────────────────────────────────────

/// Coinbase Exchange public candles endpoint.
///
/// `GET {base}/products/{product}/candles?granularity=N` returns up to ~300
/// rows of `[time, low, high, open, close, volume]`, newest first.
pub struct CoinbaseMarket {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl std::fmt::Debug for CoinbaseMarket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseMarket")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CoinbaseMarket {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ladder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn candles_url(&self, product: &str) -> String {
        format!("{}/products/{product}/candles", self.base_url)
    }
}

impl MarketData for CoinbaseMarket {
    fn name(&self) -> &str {
        "coinbase"
    }

    fn candles(&self, product: &str, granularity_secs: u32) -> Result<Vec<Bar>, DataError> {
        let url = self.candles_url(product);
        let resp = self
            .client
            .get(&url)
            .query(&[("granularity", granularity_secs)])
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Http {
                status: status.as_u16(),
                url,
            });
        }

        let body: serde_json::Value = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse candles for {product}: {e}"))
        })?;
        parse_candles(&body)
    }
}

/// Convert a Coinbase candles payload into an ascending bar series.
pub fn parse_candles(body: &serde_json::Value) -> Result<Vec<Bar>, DataError> {
    let rows = body.as_array().ok_or_else(|| {
        let preview: String = body.to_string().chars().take(120).collect();
        DataError::ResponseFormatChanged(format!("unexpected candles response: {preview}"))
    })?;

    let mut bars = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let fields: Vec<f64> = row
            .as_array()
            .map(|cols| cols.iter().filter_map(serde_json::Value::as_f64).collect())
            .unwrap_or_default();
        let [t, low, high, open, close, volume] = fields[..] else {
            return Err(DataError::ResponseFormatChanged(format!(
                "candle row {i} is not [time, low, high, open, close, volume]: {row}"
            )));
        };
        let time = DateTime::from_timestamp(t as i64, 0).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("invalid candle time {t}"))
        })?;
        bars.push(Bar::new(time, open, high, low, close, volume));
    }
    bars.sort_by_key(|b| b.time);
    validate_series(&bars)?;
    Ok(bars)
}

// ── Fallback ─────────────────────────────────────────────────────────

/// A live source backed by synthetic candles.
pub struct FallbackMarket {
    primary: Box<dyn MarketData>,
    fallback: SyntheticMarket,
}

impl FallbackMarket {
    pub fn new(primary: Box<dyn MarketData>, fallback: SyntheticMarket) -> Self {
        Self { primary, fallback }
    }
}

impl MarketData for FallbackMarket {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn candles(&self, product: &str, granularity_secs: u32) -> Result<Vec<Bar>, DataError> {
        match self.primary.candles(product, granularity_secs) {
            Ok(bars) if !bars.is_empty() => Ok(bars),
            Ok(_) => {
                tracing::warn!(source = self.primary.name(), product, "no candles; using synthetic data");
                self.fallback.candles(product, granularity_secs)
            }
            Err(e) => {
                tracing::warn!(source = self.primary.name(), product, error = %e, "fetch failed; using synthetic data");
                self.fallback.candles(product, granularity_secs)
            }
        }
    }
}
