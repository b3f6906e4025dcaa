//! EMA cross trend strategy gated by ATR% and filtered by RSI.
//!
//! On each confirmed bar:
//! 1. hold unless fast/slow EMA (current and previous), ATR, and RSI are all
//!    defined, the close is positive, and ATR/close >= `atr_min`;
//! 2. close an open position whose stop or take-profit the close has hit;
//! 3. enter on a fresh EMA cross when the RSI guard and `direction` allow it.
//!
//! An entry while already positioned replaces the open position outright.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{MarketView, PositionState, Signal, Strategy};
use crate::domain::Side;
use crate::indicators::{atr, ema, rsi};

/// Which entry directions a strategy may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    #[default]
    Both,
}

impl Direction {
    pub fn allows(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (Direction::Both, _) | (Direction::Long, Side::Long) | (Direction::Short, Side::Short)
        )
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Long => "long",
            Direction::Short => "short",
            Direction::Both => "both",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            "both" => Ok(Direction::Both),
            other => Err(format!("unknown direction '{other}' (expected long, short or both)")),
        }
    }
}

/// Parameters of [`EmaAtrTrend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaAtrSettings {
    pub fast: usize,
    pub slow: usize,
    pub atr_period: usize,
    /// Minimum ATR/close; quieter markets hold.
    pub atr_min: f64,
    /// Stop distance in ATR units.
    pub risk_atr: f64,
    /// Take-profit distance in ATR units. `<= 0` disables the take-profit.
    pub take_atr: f64,
    pub direction: Direction,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub rsi_buffer: f64,
    /// Leverage per successive entry; the last rung repeats.
    pub leverage_schedule: Vec<f64>,
    /// Used when the schedule is empty. Defaults to the last rung, or 7.
    pub leverage_default: Option<f64>,
    pub trade_count_start: u32,
}

impl Default for EmaAtrSettings {
    fn default() -> Self {
        Self {
            fast: 9,
            slow: 21,
            atr_period: 14,
            atr_min: 0.002,
            risk_atr: 1.5,
            take_atr: 2.0,
            direction: Direction::Both,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_buffer: 1.0,
            leverage_schedule: vec![10.0, 10.0, 8.0, 7.0],
            leverage_default: None,
            trade_count_start: 0,
        }
    }
}

impl EmaAtrSettings {
    pub fn effective_leverage_default(&self) -> f64 {
        self.leverage_default
            .or_else(|| self.leverage_schedule.last().copied())
            .unwrap_or(7.0)
    }

    /// Minimum history length before any signal can fire.
    pub fn min_bars(&self) -> usize {
        self.slow.max(self.atr_period).max(self.rsi_period) + 2
    }
}

/// Indicator readings at the evaluated bar.
#[derive(Debug, Clone, Copy)]
struct Readings {
    close: f64,
    atr: f64,
    rsi: f64,
    cross_up: bool,
    cross_down: bool,
}

#[derive(Debug, Clone)]
pub struct EmaAtrTrend {
    settings: EmaAtrSettings,
    leverage_default: f64,
    trade_count: u32,
    last_leverage: Option<f64>,
    position: PositionState,
}

impl EmaAtrTrend {
    pub fn new(settings: EmaAtrSettings) -> Self {
        Self {
            leverage_default: settings.effective_leverage_default(),
            trade_count: settings.trade_count_start,
            last_leverage: None,
            position: PositionState::Flat,
            settings,
        }
    }

    pub fn settings(&self) -> &EmaAtrSettings {
        &self.settings
    }

    /// Leverage rung the next entry will receive.
    pub fn next_leverage(&self) -> f64 {
        let schedule = &self.settings.leverage_schedule;
        match schedule.len() {
            0 => self.leverage_default,
            len => schedule[(self.trade_count as usize).min(len - 1)],
        }
    }

    fn readings(&self, view: &MarketView<'_>) -> Option<Readings> {
        let s = &self.settings;
        let closes = view.closes;
        let n = closes.len();
        if n < s.min_bars() {
            return None;
        }

        let ef = ema(closes, s.fast);
        let es = ema(closes, s.slow);
        let (ef_now, ef_prev) = (ef[n - 1], ef[n - 2]);
        let (es_now, es_prev) = (es[n - 1], es[n - 2]);
        if [ef_now, ef_prev, es_now, es_prev].iter().any(|v| v.is_nan()) {
            return None;
        }

        let close = closes[n - 1];
        let atr_now = atr(view.highs_or_closes(), view.lows_or_closes(), closes, s.atr_period)[n - 1];
        if atr_now.is_nan() || close <= 0.0 {
            return None;
        }
        if atr_now / close < s.atr_min {
            return None;
        }

        let rsi_now = rsi(closes, s.rsi_period)[n - 1];
        if rsi_now.is_nan() {
            return None;
        }

        Some(Readings {
            close,
            atr: atr_now,
            rsi: rsi_now,
            cross_up: ef_prev <= es_prev && ef_now > es_now,
            cross_down: ef_prev >= es_prev && ef_now < es_now,
        })
    }

    fn enter(&mut self, side: Side, r: &Readings) {
        self.last_leverage = Some(self.next_leverage());
        self.trade_count += 1;
        self.position = PositionState::open(
            side,
            r.close,
            r.atr,
            self.settings.risk_atr,
            self.settings.take_atr,
        );
    }
}

impl Strategy for EmaAtrTrend {
    fn name(&self) -> &str {
        "ema_atr_trend"
    }

    fn generate_signal(&mut self, view: &MarketView<'_>) -> Signal {
        let Some(r) = self.readings(view) else {
            return Signal::Hold;
        };

        if self.position.exit_hit(r.close) {
            tracing::debug!(close = r.close, position = ?self.position, "exit level hit");
            self.position = PositionState::Flat;
        }

        let s = &self.settings;
        let direction = s.direction;
        let overbought = s.rsi_overbought - s.rsi_buffer;
        let oversold = s.rsi_oversold + s.rsi_buffer;

        if r.cross_up && direction.allows(Side::Long) && r.rsi < overbought {
            self.enter(Side::Long, &r);
            return Signal::Buy;
        }
        if r.cross_down && direction.allows(Side::Short) && r.rsi > oversold {
            self.enter(Side::Short, &r);
            return Signal::Sell;
        }
        Signal::Hold
    }

    fn position(&self) -> PositionState {
        self.position
    }

    fn last_leverage(&self) -> Option<f64> {
        self.last_leverage
    }

    fn trade_count(&self) -> u32 {
        self.trade_count
    }
}
