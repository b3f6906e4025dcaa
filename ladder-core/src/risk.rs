//! Risk sizing engine.
//!
//! Validates one proposed trade against the account balance and the risk
//! parameters, and sizes it so that hitting the stop loses a fixed fraction
//! of the balance (scaled by leverage).
//!
//! # Formula
//! ```text
//! risk_per_unit   = |entry - stop|   (sign checked per side)
//! reward_per_unit = |target - entry| (sign checked per side)
//! rrr             = reward_per_unit / risk_per_unit
//! size            = balance * risk_per_trade * leverage / risk_per_unit
//! ```
//!
//! # Example
//! - Balance: $10,000, risk per trade 1%
//! - Long at 100, stop 95, target 115: risk 5, reward 15, rrr 3.0
//! - Size: 10,000 * 0.01 / 5 = 20 units

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use thiserror::Error;

use crate::domain::{Bar, Side, TradeIdea};
use crate::indicators::{atr, last_defined};

/// Why a trade idea was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("invalid trade parameters: {0}")]
    InvalidTradeParameters(String),

    #[error("reward/risk {rrr:.2} below minimum {min_rrr:.2}")]
    RiskRejected { rrr: f64, min_rrr: f64 },

    #[error("insufficient market data: {0}")]
    InsufficientMarketData(String),

    /// Prices pass but balance or leverage leave nothing to size.
    #[error("no position to size (balance {balance}, leverage {leverage})")]
    NonPositiveSize { balance: f64, leverage: f64 },
}

/// Risk parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of balance risked per trade (e.g., 0.01 = 1%).
    pub risk_per_trade: f64,
    /// Maximum fraction of the day-start balance that may be lost.
    pub max_daily_loss: f64,
    pub max_positions: u32,
    pub min_rrr: f64,
    /// Leverage applied by [`RiskEngine::suggest_trade`].
    pub max_leverage: f64,
    /// Stop distance in ATR units when no stop is supplied.
    pub stop_atr_mult: f64,
    /// Reward/risk used for the target when none is supplied.
    pub tp_rr: f64,
    pub atr_period: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.01,
            max_daily_loss: 0.05,
            max_positions: 3,
            min_rrr: 1.5,
            max_leverage: 1.0,
            stop_atr_mult: 1.5,
            tp_rr: 2.0,
            atr_period: 14,
        }
    }
}

/// Inputs for drafting a trade idea.
#[derive(Debug, Clone, Copy)]
pub struct TradeRequest<'a> {
    pub symbol: &'a str,
    pub side: Side,
    pub entry: f64,
    /// Derived from ATR over `bars` when absent.
    pub stop: Option<f64>,
    /// Falls back to `RiskConfig::tp_rr`.
    pub rr: Option<f64>,
    pub bars: Option<&'a [Bar]>,
}

impl<'a> TradeRequest<'a> {
    pub fn new(symbol: &'a str, side: Side, entry: f64) -> Self {
        Self {
            symbol,
            side,
            entry,
            stop: None,
            rr: None,
            bars: None,
        }
    }

    pub fn with_stop(mut self, stop: Option<f64>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_rr(mut self, rr: Option<f64>) -> Self {
        self.rr = rr;
        self
    }

    pub fn with_bars(mut self, bars: &'a [Bar]) -> Self {
        self.bars = Some(bars);
        self
    }
}

fn is_positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
    daily_start_balance: Option<f64>,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            daily_start_balance: None,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn max_leverage(&self) -> f64 {
        self.config.max_leverage
    }

    pub fn set_max_leverage(&mut self, leverage: f64) {
        self.config.max_leverage = leverage;
    }

    pub fn daily_start_balance(&self) -> Option<f64> {
        self.daily_start_balance
    }

    /// Validate and size a trade. Mutates nothing.
    pub fn compute_position(
        &self,
        balance: f64,
        entry: f64,
        stop: f64,
        target: f64,
        side: Side,
        leverage: f64,
    ) -> Result<TradeIdea, RiskError> {
        if !(is_positive(entry) && is_positive(stop) && is_positive(target)) {
            return Err(RiskError::InvalidTradeParameters(format!(
                "entry {entry}, stop {stop} and target {target} must all be positive"
            )));
        }

        let sign = side.sign();
        let risk_per_unit = (entry - stop) * sign;
        let reward_per_unit = (target - entry) * sign;
        if risk_per_unit <= 0.0 || reward_per_unit <= 0.0 {
            return Err(RiskError::InvalidTradeParameters(format!(
                "{side} trade needs positive risk and reward (risk {risk_per_unit}, reward {reward_per_unit})"
            )));
        }

        let rrr = reward_per_unit / risk_per_unit;
        if rrr < self.config.min_rrr {
            return Err(RiskError::RiskRejected {
                rrr,
                min_rrr: self.config.min_rrr,
            });
        }

        let size = balance * self.config.risk_per_trade * leverage / risk_per_unit;
        if !(is_positive(balance) && is_positive(leverage) && is_positive(size)) {
            return Err(RiskError::NonPositiveSize { balance, leverage });
        }

        Ok(TradeIdea {
            side,
            entry,
            stop,
            target,
            size,
            leverage,
            rrr,
        })
    }

    /// Draft a trade idea: derive the stop from ATR if needed, place the
    /// target at `rr` times the stop distance, and size at the current
    /// leverage cap.
    pub fn suggest_trade(&self, req: &TradeRequest<'_>, balance: f64) -> Result<TradeIdea, RiskError> {
        if !is_positive(req.entry) {
            return Err(RiskError::InvalidTradeParameters(format!(
                "entry {} must be positive",
                req.entry
            )));
        }

        let stop = match req.stop {
            Some(stop) => stop,
            None => req.entry - req.side.sign() * self.config.stop_atr_mult * self.atr_from(req)?,
        };

        let rr = req.rr.unwrap_or(self.config.tp_rr);
        let target = req.entry + req.side.sign() * rr * (req.entry - stop).abs();

        let idea = self.compute_position(
            balance,
            req.entry,
            stop,
            target,
            req.side,
            self.config.max_leverage,
        )?;
        tracing::debug!(
            symbol = req.symbol,
            side = %idea.side,
            entry = idea.entry,
            stop = idea.stop,
            target = idea.target,
            size = idea.size,
            leverage = idea.leverage,
            "trade idea drafted"
        );
        Ok(idea)
    }

    fn atr_from(&self, req: &TradeRequest<'_>) -> Result<f64, RiskError> {
        let bars = req.bars.ok_or_else(|| {
            RiskError::InsufficientMarketData(format!("{}: no stop and no bars for ATR", req.symbol))
        })?;
        let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        last_defined(&atr(&high, &low, &close, self.config.atr_period)).ok_or_else(|| {
            RiskError::InsufficientMarketData(format!(
                "{}: ATR({}) undefined over {} bars",
                req.symbol,
                self.config.atr_period,
                bars.len()
            ))
        })
    }

    /// Record `balance` as the start of a new trading day.
    pub fn reset_daily(&mut self, balance: f64) {
        self.daily_start_balance = Some(balance);
    }

    /// True while the drawdown from the day-start balance stays within
    /// `max_daily_loss`. The first call arms the day-start balance.
    pub fn check_daily_limit(&mut self, balance: f64) -> bool {
        let start = *self.daily_start_balance.get_or_insert(balance);
        start - balance <= self.config.max_daily_loss * start
    }

    /// Temporarily replace the leverage cap. The previous cap is restored
    /// when the returned guard drops.
    pub fn override_leverage(&mut self, leverage: f64) -> LeverageOverride<'_> {
        let previous = self.config.max_leverage;
        self.config.max_leverage = leverage;
        LeverageOverride {
            engine: self,
            previous,
        }
    }
}

/// Scoped leverage cap. Derefs to the engine it borrows.
#[derive(Debug)]
pub struct LeverageOverride<'a> {
    engine: &'a mut RiskEngine,
    previous: f64,
}

impl Deref for LeverageOverride<'_> {
    type Target = RiskEngine;

    fn deref(&self) -> &RiskEngine {
        self.engine
    }
}

impl DerefMut for LeverageOverride<'_> {
    fn deref_mut(&mut self) -> &mut RiskEngine {
        self.engine
    }
}

impl Drop for LeverageOverride<'_> {
    fn drop(&mut self) {
        self.engine.config.max_leverage = self.previous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn engine() -> RiskEngine {
        RiskEngine::new(RiskConfig::default())
    }

    #[test]
    fn sizing_scenario_long() {
        let idea = engine()
            .compute_position(10_000.0, 100.0, 95.0, 115.0, Side::Long, 1.0)
            .unwrap();
        assert_approx(idea.risk_per_unit(), 5.0, DEFAULT_EPSILON);
        assert_approx(idea.reward_per_unit(), 15.0, DEFAULT_EPSILON);
        assert_approx(idea.rrr, 3.0, DEFAULT_EPSILON);
        assert_approx(idea.size, 20.0, DEFAULT_EPSILON);
        assert_eq!(idea.target, 115.0);
    }

    #[test]
    fn sizing_short_mirrors_long() {
        let idea = engine()
            .compute_position(10_000.0, 100.0, 105.0, 85.0, Side::Short, 2.0)
            .unwrap();
        assert_approx(idea.rrr, 3.0, DEFAULT_EPSILON);
        assert_approx(idea.size, 40.0, DEFAULT_EPSILON);
        assert_eq!(idea.leverage, 2.0);
    }

    #[test]
    fn rejects_non_positive_prices() {
        let e = engine();
        for (entry, stop, target) in [(0.0, 95.0, 115.0), (100.0, 0.0, 115.0), (100.0, 95.0, -1.0)] {
            assert!(matches!(
                e.compute_position(10_000.0, entry, stop, target, Side::Long, 1.0),
                Err(RiskError::InvalidTradeParameters(_))
            ));
        }
        assert!(e
            .compute_position(10_000.0, f64::NAN, 95.0, 115.0, Side::Long, 1.0)
            .is_err());
    }

    #[test]
    fn rejects_stop_on_wrong_side() {
        let e = engine();
        assert!(matches!(
            e.compute_position(10_000.0, 100.0, 105.0, 115.0, Side::Long, 1.0),
            Err(RiskError::InvalidTradeParameters(_))
        ));
        assert!(matches!(
            e.compute_position(10_000.0, 100.0, 95.0, 115.0, Side::Short, 1.0),
            Err(RiskError::InvalidTradeParameters(_))
        ));
    }

    #[test]
    fn rejects_empty_balance_and_leverage() {
        let e = engine();
        for (balance, leverage) in [(-100.0, 1.0), (0.0, 1.0), (10_000.0, 0.0), (10_000.0, -2.0)] {
            let err = e
                .compute_position(balance, 100.0, 95.0, 110.0, Side::Long, leverage)
                .unwrap_err();
            assert_eq!(err, RiskError::NonPositiveSize { balance, leverage });
        }
        // price checks still win over sizing
        assert!(matches!(
            e.compute_position(0.0, 100.0, 95.0, 101.0, Side::Long, 1.0),
            Err(RiskError::RiskRejected { .. })
        ));
    }

    #[test]
    fn rejects_low_reward_to_risk() {
        let err = engine()
            .compute_position(10_000.0, 100.0, 95.0, 105.0, Side::Long, 1.0)
            .unwrap_err();
        assert_eq!(
            err,
            RiskError::RiskRejected {
                rrr: 1.0,
                min_rrr: 1.5
            }
        );
    }

    #[test]
    fn suggest_trade_uses_rr_and_leverage_cap() {
        let mut e = engine();
        e.set_max_leverage(5.0);
        let req = TradeRequest::new("BTC-USD", Side::Long, 100.0)
            .with_stop(Some(98.0))
            .with_rr(Some(3.0));
        let idea = e.suggest_trade(&req, 1_000.0).unwrap();
        assert_approx(idea.target, 106.0, DEFAULT_EPSILON);
        assert_eq!(idea.leverage, 5.0);
        // 1000 * 0.01 * 5 / 2
        assert_approx(idea.size, 25.0, DEFAULT_EPSILON);
    }

    #[test]
    fn suggest_trade_defaults_rr_to_tp_rr() {
        let req = TradeRequest::new("BTC-USD", Side::Short, 100.0).with_stop(Some(102.0));
        let idea = engine().suggest_trade(&req, 1_000.0).unwrap();
        assert_approx(idea.target, 96.0, DEFAULT_EPSILON);
        assert_approx(idea.rrr, 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn suggest_trade_derives_stop_from_atr() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 3) as f64).collect();
        let bars = make_bars(&closes);
        let e = engine();
        let entry = *closes.last().unwrap();
        let req = TradeRequest::new("BTC-USD", Side::Long, entry).with_bars(&bars);
        let idea = e.suggest_trade(&req, 1_000.0).unwrap();

        let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let atr_now = *atr(&high, &low, &closes, 14).last().unwrap();
        assert_approx(idea.stop, entry - 1.5 * atr_now, 1e-9);
        assert_approx(idea.rrr, 2.0, 1e-9);
    }

    #[test]
    fn suggest_trade_without_stop_or_bars_fails() {
        let req = TradeRequest::new("BTC-USD", Side::Long, 100.0);
        assert!(matches!(
            engine().suggest_trade(&req, 1_000.0),
            Err(RiskError::InsufficientMarketData(_))
        ));

        let bars = make_bars(&[100.0, 101.0]);
        let req = req.with_bars(&bars);
        assert!(matches!(
            engine().suggest_trade(&req, 1_000.0),
            Err(RiskError::InsufficientMarketData(_))
        ));
    }

    #[test]
    fn daily_limit_arms_on_first_call() {
        let mut e = engine();
        assert!(e.check_daily_limit(1_000.0));
        assert_eq!(e.daily_start_balance(), Some(1_000.0));
        assert!(e.check_daily_limit(950.0));
        assert!(!e.check_daily_limit(949.0));

        e.reset_daily(949.0);
        assert!(e.check_daily_limit(949.0));
    }

    #[test]
    fn leverage_override_restores_on_drop() {
        let mut e = engine();
        {
            let guard = e.override_leverage(10.0);
            assert_eq!(guard.max_leverage(), 10.0);
        }
        assert_eq!(e.max_leverage(), 1.0);
    }

    #[test]
    fn leverage_override_restores_on_early_return() {
        fn fails(e: &mut RiskEngine) -> Result<TradeIdea, RiskError> {
            let guard = e.override_leverage(8.0);
            let req = TradeRequest::new("X", Side::Long, 100.0);
            guard.suggest_trade(&req, 100.0)
        }
        let mut e = engine();
        assert!(fails(&mut e).is_err());
        assert_eq!(e.max_leverage(), 1.0);
    }
}
