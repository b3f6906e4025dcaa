//! Multi-timeframe wrapper: lower-timeframe entries confirmed by a
//! higher-timeframe bias.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{EmaAtrSettings, EmaAtrTrend, MarketView, PositionState, Signal, Strategy};
use crate::domain::Side;
use crate::indicators::ema;

/// Higher-timeframe gate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtfBias {
    /// Approve a side only when the HTF close is on that side of its EMA.
    #[default]
    Follow,
    LongOnly,
    ShortOnly,
}

impl fmt::Display for HtfBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HtfBias::Follow => "follow",
            HtfBias::LongOnly => "long_only",
            HtfBias::ShortOnly => "short_only",
        };
        write!(f, "{s}")
    }
}

impl FromStr for HtfBias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "follow" => Ok(HtfBias::Follow),
            "long_only" => Ok(HtfBias::LongOnly),
            "short_only" => Ok(HtfBias::ShortOnly),
            other => Err(format!(
                "unknown htf bias '{other}' (expected follow, long_only or short_only)"
            )),
        }
    }
}

/// [`EmaAtrTrend`] whose entries must also pass the higher-timeframe gate.
///
/// The core machine always advances, so a rejected entry still consumes a
/// leverage rung and updates the core position.
#[derive(Debug, Clone)]
pub struct EmaAtrTrendMtf {
    core: EmaAtrTrend,
    htf_ema: usize,
    htf_bias: HtfBias,
}

impl EmaAtrTrendMtf {
    pub fn new(settings: EmaAtrSettings, htf_ema: usize, htf_bias: HtfBias) -> Self {
        Self {
            core: EmaAtrTrend::new(settings),
            htf_ema,
            htf_bias,
        }
    }

    pub fn core(&self) -> &EmaAtrTrend {
        &self.core
    }

    pub fn htf_bias(&self) -> HtfBias {
        self.htf_bias
    }

    /// Whether the higher timeframe approves an entry on `side`.
    pub fn htf_allows(&self, htf_closes: &[f64], side: Side) -> bool {
        match self.htf_bias {
            HtfBias::LongOnly => side == Side::Long,
            HtfBias::ShortOnly => side == Side::Short,
            HtfBias::Follow => {
                let n = htf_closes.len();
                if n < self.htf_ema + 1 {
                    return false;
                }
                let trend = ema(htf_closes, self.htf_ema)[n - 1];
                if trend.is_nan() {
                    return false;
                }
                let last = htf_closes[n - 1];
                match side {
                    Side::Long => last > trend,
                    Side::Short => last < trend,
                }
            }
        }
    }
}

impl Strategy for EmaAtrTrendMtf {
    fn name(&self) -> &str {
        "ema_atr_trend_mtf"
    }

    fn generate_signal(&mut self, view: &MarketView<'_>) -> Signal {
        let htf = match view.htf_closes {
            Some(h) if !h.is_empty() => h,
            _ => return Signal::Hold,
        };

        let signal = self.core.generate_signal(view);
        match signal.side() {
            Some(side) if self.htf_allows(htf, side) => signal,
            Some(side) => {
                tracing::debug!(%side, bias = %self.htf_bias, "entry rejected by higher timeframe");
                Signal::Hold
            }
            None => Signal::Hold,
        }
    }

    fn needs_htf(&self) -> bool {
        true
    }

    fn position(&self) -> PositionState {
        self.core.position()
    }

    fn last_leverage(&self) -> Option<f64> {
        self.core.last_leverage()
    }

    fn trade_count(&self) -> u32 {
        self.core.trade_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (0..n).map(|i| 500.0 - i as f64).collect()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                100.0 + 6.0 * (x * 0.12).sin() + 1.5 * (x * 1.3).sin()
            })
            .collect()
    }

    /// Shortest prefix of `wave` on which the plain core strategy emits `want`.
    fn core_signal_prefix(want: Signal) -> Vec<f64> {
        let closes = wave(400);
        let min = EmaAtrSettings::default().min_bars();
        (min..=closes.len())
            .map(|len| closes[..len].to_vec())
            .find(|prefix| {
                let mut core = EmaAtrTrend::new(EmaAtrSettings::default());
                core.generate_signal(&MarketView::new(prefix)) == want
            })
            .expect("wave produces the requested signal")
    }

    #[test]
    fn follow_requires_enough_htf_history() {
        let strat = EmaAtrTrendMtf::new(EmaAtrSettings::default(), 5, HtfBias::Follow);
        assert!(!strat.htf_allows(&rising(5), Side::Long));
        assert!(strat.htf_allows(&rising(6), Side::Long));
        assert!(!strat.htf_allows(&rising(6), Side::Short));
        assert!(strat.htf_allows(&falling(6), Side::Short));
    }

    #[test]
    fn one_sided_modes_ignore_htf_prices() {
        let long_only = EmaAtrTrendMtf::new(EmaAtrSettings::default(), 200, HtfBias::LongOnly);
        assert!(long_only.htf_allows(&[1.0], Side::Long));
        assert!(!long_only.htf_allows(&rising(300), Side::Short));

        let short_only = EmaAtrTrendMtf::new(EmaAtrSettings::default(), 200, HtfBias::ShortOnly);
        assert!(short_only.htf_allows(&[1.0], Side::Short));
        assert!(!short_only.htf_allows(&falling(300), Side::Long));
    }

    #[test]
    fn missing_htf_holds_without_advancing_core() {
        let closes = core_signal_prefix(Signal::Buy);
        let mut strat = EmaAtrTrendMtf::new(EmaAtrSettings::default(), 5, HtfBias::LongOnly);
        assert_eq!(strat.generate_signal(&MarketView::new(&closes)), Signal::Hold);
        assert_eq!(
            strat.generate_signal(&MarketView::new(&closes).with_htf(&[])),
            Signal::Hold
        );
        assert_eq!(strat.trade_count(), 0);
    }

    #[test]
    fn approved_entry_passes_through() {
        let closes = core_signal_prefix(Signal::Buy);
        let htf = rising(30);
        let mut strat = EmaAtrTrendMtf::new(EmaAtrSettings::default(), 5, HtfBias::Follow);
        assert_eq!(
            strat.generate_signal(&MarketView::new(&closes).with_htf(&htf)),
            Signal::Buy
        );
        assert_eq!(strat.position().side(), Some(Side::Long));
        assert_eq!(strat.last_leverage(), Some(10.0));
        assert_eq!(strat.trade_count(), 1);
        assert!(strat.stop().is_some());
    }

    #[test]
    fn rejected_entry_holds_but_core_advances() {
        let closes = core_signal_prefix(Signal::Sell);
        let htf = rising(30);
        let mut strat = EmaAtrTrendMtf::new(EmaAtrSettings::default(), 5, HtfBias::Follow);
        assert_eq!(
            strat.generate_signal(&MarketView::new(&closes).with_htf(&htf)),
            Signal::Hold
        );
        assert_eq!(strat.trade_count(), 1);
        assert_eq!(strat.position().side(), Some(Side::Short));
    }

    #[test]
    fn bias_parses() {
        assert_eq!("long_only".parse::<HtfBias>(), Ok(HtfBias::LongOnly));
        assert_eq!(" Follow ".parse::<HtfBias>(), Ok(HtfBias::Follow));
        assert!("sideways".parse::<HtfBias>().is_err());
    }
}
