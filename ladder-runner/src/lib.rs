//! Ladder Runner: configuration, market data, resampling, signal polling.
//!
//! This crate builds on `ladder-core` to provide:
//! - `AppConfig` loaded from TOML with environment overrides and validation
//! - Market-data collaborators (synthetic, CSV, Coinbase public candles)
//! - Timeframe resampling for the multi-timeframe gate
//! - The polling loop that turns fresh bars into signals and, when enabled,
//!   into orchestrated rounds
//! - Logging setup for binaries

pub mod config;
pub mod logging;
pub mod market;
pub mod poller;
pub mod resample;

pub use config::{AppConfig, ConfigError, MarketSettings, MarketSource, RunnerSettings};
pub use logging::{init_logging, LoggingError, LoggingHandle, LoggingOptions, RotatingFile};
pub use market::{
    build_market, CoinbaseMarket, CsvMarket, DataError, FallbackMarket, MarketData,
    SyntheticMarket,
};
pub use poller::{PollError, Poller, StepOutcome, StepReport, TradingDesk};
pub use resample::resample;
