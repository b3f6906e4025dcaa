//! Strategy state machines.
//!
//! A strategy consumes the price history available at a confirmed bar and
//! emits a [`Signal`]. Stateful strategies also track an open position and the
//! leverage rung assigned to their latest entry.
//!
//! Three variants share the [`Strategy`] interface:
//! - [`EmaAtrTrend`]: EMA cross entries gated by ATR% and an RSI guard.
//! - [`EmaAtrTrendMtf`]: wraps an [`EmaAtrTrend`] with a higher-timeframe bias gate.
//! - [`SmaCross`]: stateless SMA crossover.

pub mod ema_atr;
pub mod mtf;
pub mod position;
pub mod sma_cross;

pub use ema_atr::{Direction, EmaAtrSettings, EmaAtrTrend};
pub use mtf::{EmaAtrTrendMtf, HtfBias};
pub use position::PositionState;
pub use sma_cross::SmaCross;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{Bar, Side};

/// Decision emitted for one confirmed bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// Side an actionable signal would open.
    pub fn side(&self) -> Option<Side> {
        match self {
            Signal::Buy => Some(Side::Long),
            Signal::Sell => Some(Side::Short),
            Signal::Hold => None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Hold => "hold",
        };
        f.pad(s)
    }
}

/// Price history visible to a strategy at one confirmed bar.
///
/// `highs`/`lows` fall back to `closes` when absent. `htf_closes` carries the
/// higher-timeframe closes for the multi-timeframe variant.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    pub closes: &'a [f64],
    pub highs: Option<&'a [f64]>,
    pub lows: Option<&'a [f64]>,
    pub htf_closes: Option<&'a [f64]>,
}

impl<'a> MarketView<'a> {
    pub fn new(closes: &'a [f64]) -> Self {
        Self {
            closes,
            highs: None,
            lows: None,
            htf_closes: None,
        }
    }

    pub fn with_high_low(mut self, highs: &'a [f64], lows: &'a [f64]) -> Self {
        self.highs = Some(highs);
        self.lows = Some(lows);
        self
    }

    pub fn with_htf(mut self, htf_closes: &'a [f64]) -> Self {
        self.htf_closes = Some(htf_closes);
        self
    }

    pub fn highs_or_closes(&self) -> &'a [f64] {
        self.highs.unwrap_or(self.closes)
    }

    pub fn lows_or_closes(&self) -> &'a [f64] {
        self.lows.unwrap_or(self.closes)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

/// Owned OHLC columns extracted from a bar slice, for building a [`MarketView`].
#[derive(Debug, Clone, Default)]
pub struct SeriesColumns {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
}

impl SeriesColumns {
    pub fn from_bars(bars: &[Bar]) -> Self {
        Self {
            closes: bars.iter().map(|b| b.close).collect(),
            highs: bars.iter().map(|b| b.high).collect(),
            lows: bars.iter().map(|b| b.low).collect(),
        }
    }

    pub fn view(&self) -> MarketView<'_> {
        MarketView::new(&self.closes).with_high_low(&self.highs, &self.lows)
    }
}

/// A signal producer. One instance per symbol; not shared between callers.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Evaluate the latest bar of `view` and advance any internal state.
    fn generate_signal(&mut self, view: &MarketView<'_>) -> Signal;

    /// Whether the strategy reads `MarketView::htf_closes`.
    fn needs_htf(&self) -> bool {
        false
    }

    fn position(&self) -> PositionState {
        PositionState::Flat
    }

    fn stop(&self) -> Option<f64> {
        self.position().stop()
    }

    fn take(&self) -> Option<f64> {
        self.position().take()
    }

    /// Leverage rung assigned to the most recent entry.
    fn last_leverage(&self) -> Option<f64> {
        None
    }

    fn trade_count(&self) -> u32 {
        0
    }
}

/// Strategy selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    EmaAtrTrend,
    #[default]
    EmaAtrTrendMtf,
    SmaCross,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::EmaAtrTrend => "ema_atr_trend",
            StrategyKind::EmaAtrTrendMtf => "ema_atr_trend_mtf",
            StrategyKind::SmaCross => "sma_cross",
        };
        write!(f, "{s}")
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ema_atr_trend" => Ok(StrategyKind::EmaAtrTrend),
            "ema_atr_trend_mtf" => Ok(StrategyKind::EmaAtrTrendMtf),
            "sma_cross" => Ok(StrategyKind::SmaCross),
            other => Err(format!(
                "unknown strategy '{other}' (expected ema_atr_trend, ema_atr_trend_mtf or sma_cross)"
            )),
        }
    }
}

/// Full strategy configuration: the selector plus every variant's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub kind: StrategyKind,
    #[serde(flatten)]
    pub ema_atr: EmaAtrSettings,
    pub htf_ema: usize,
    pub htf_bias: HtfBias,
    pub sma_fast: usize,
    pub sma_slow: usize,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            kind: StrategyKind::default(),
            ema_atr: EmaAtrSettings::default(),
            htf_ema: 200,
            htf_bias: HtfBias::default(),
            sma_fast: 20,
            sma_slow: 50,
        }
    }
}

/// Build the configured strategy.
pub fn build_strategy(settings: &StrategySettings) -> Box<dyn Strategy> {
    match settings.kind {
        StrategyKind::EmaAtrTrend => Box::new(EmaAtrTrend::new(settings.ema_atr.clone())),
        StrategyKind::EmaAtrTrendMtf => Box::new(EmaAtrTrendMtf::new(
            settings.ema_atr.clone(),
            settings.htf_ema,
            settings.htf_bias,
        )),
        StrategyKind::SmaCross => Box::new(SmaCross::new(settings.sma_fast, settings.sma_slow)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_sides() {
        assert_eq!(Signal::Buy.side(), Some(Side::Long));
        assert_eq!(Signal::Sell.side(), Some(Side::Short));
        assert_eq!(Signal::Hold.side(), None);
        assert!(!Signal::Hold.is_actionable());
        assert_eq!(format!("{:>4}", Signal::Buy), " buy");
    }

    #[test]
    fn view_falls_back_to_closes() {
        let closes = [1.0, 2.0];
        let view = MarketView::new(&closes);
        assert_eq!(view.highs_or_closes(), &closes);
        assert_eq!(view.lows_or_closes(), &closes);
        assert_eq!(view.last_close(), Some(2.0));
    }

    #[test]
    fn strategy_kind_parses_and_displays() {
        for kind in [
            StrategyKind::EmaAtrTrend,
            StrategyKind::EmaAtrTrendMtf,
            StrategyKind::SmaCross,
        ] {
            assert_eq!(kind.to_string().parse::<StrategyKind>(), Ok(kind));
        }
        assert!("martingale".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn build_strategy_picks_variant() {
        let mut settings = StrategySettings::default();
        assert_eq!(build_strategy(&settings).name(), "ema_atr_trend_mtf");
        assert!(build_strategy(&settings).needs_htf());

        settings.kind = StrategyKind::SmaCross;
        let strat = build_strategy(&settings);
        assert_eq!(strat.name(), "sma_cross");
        assert!(!strat.needs_htf());
    }

    #[test]
    fn settings_deserialize_flat_table() {
        let settings: StrategySettings =
            serde_json::from_str(r#"{"kind":"ema_atr_trend","fast":5,"htf_bias":"long_only"}"#)
                .unwrap();
        assert_eq!(settings.kind, StrategyKind::EmaAtrTrend);
        assert_eq!(settings.ema_atr.fast, 5);
        assert_eq!(settings.ema_atr.slow, 21);
        assert_eq!(settings.htf_bias, HtfBias::LongOnly);
        assert_eq!(settings.htf_ema, 200);
    }
}
