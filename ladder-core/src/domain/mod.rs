//! Domain types shared by the indicator, strategy, risk and session layers.

pub mod bar;
pub mod trade;

pub use bar::{closes, highs, lows, validate_series, Bar, BarError};
pub use trade::{Side, TradeIdea, TradeResult};
