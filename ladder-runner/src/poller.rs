//! Signal polling loop.
//!
//! Each step fetches the latest trigger candles and decides whether the
//! strategy should see them:
//! 1. Fewer than `min_bars` candles → wait.
//! 2. Confirm-on-close: the newest candle was already evaluated → wait.
//! 3. Cooldown after a buy/sell: consume one bar → wait.
//! 4. Otherwise evaluate, report, and on buy/sell arm the cooldown and, when
//!    trading is enabled, run one orchestrated round with the strategy's
//!    side, entry and stop. A completed ladder switches trading off and
//!    the loop keeps reporting signals.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use ladder_core::domain::{closes, Bar};
use ladder_core::risk::{RiskEngine, TradeRequest};
use ladder_core::round::{run_one_round, RoundError, RoundOutcome};
use ladder_core::session::{SessionController, SessionError};
use ladder_core::strategy::{SeriesColumns, Signal, Strategy};
use ladder_core::venue::ExecutionVenue;

use crate::config::{MarketSettings, RunnerSettings};
use crate::market::{DataError, MarketData};
use crate::resample::resample;

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Round(#[from] RoundError),
}

/// Session, risk engine and venue used when trading is enabled.
pub struct TradingDesk {
    pub session: SessionController,
    pub risk: RiskEngine,
    pub venue: Box<dyn ExecutionVenue>,
}

/// What the strategy said about one closed bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub time: DateTime<Utc>,
    pub product: String,
    pub signal: Signal,
    pub price: f64,
    pub leverage: Option<f64>,
    pub stop: Option<f64>,
    pub take: Option<f64>,
    /// Present when the signal was handed to the round orchestrator.
    pub round: Option<RoundOutcome>,
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.2}"))
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lev = self
            .leverage
            .map_or_else(|| "-".to_string(), |l| format!("{l}x"));
        write!(
            f,
            "{} | {} | sig={:>4} | px={:.2} | lev={} | stop={} | take={}",
            self.time.format("%Y-%m-%d %H:%M:%S"),
            self.product,
            self.signal,
            self.price,
            lev,
            fmt_opt(self.stop),
            fmt_opt(self.take),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    NotEnoughBars { have: usize, need: usize },
    AwaitingClose,
    Cooldown { remaining: u32 },
    Evaluated(Box<StepReport>),
}

pub struct Poller {
    product: String,
    granularity_secs: u32,
    htf_factor: usize,
    settings: RunnerSettings,
    strategy: Box<dyn Strategy>,
    market: Box<dyn MarketData>,
    desk: Option<TradingDesk>,
    last_bar: Option<DateTime<Utc>>,
    cooldown_left: u32,
}

impl Poller {
    pub fn new(
        strategy: Box<dyn Strategy>,
        market: Box<dyn MarketData>,
        market_settings: &MarketSettings,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            product: market_settings.product.clone(),
            granularity_secs: market_settings.granularity_secs,
            htf_factor: market_settings.htf_factor,
            settings,
            strategy,
            market,
            desk: None,
            last_bar: None,
            cooldown_left: 0,
        }
    }

    /// Attach the desk used for rounds when `trading_enabled` is set.
    pub fn with_desk(mut self, desk: TradingDesk) -> Self {
        self.desk = Some(desk);
        self
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub fn desk(&self) -> Option<&TradingDesk> {
        self.desk.as_ref()
    }

    pub fn cooldown_left(&self) -> u32 {
        self.cooldown_left
    }

    pub fn trading_enabled(&self) -> bool {
        self.settings.trading_enabled
    }

    /// Fetch candles and evaluate them.
    pub fn step(&mut self) -> Result<StepOutcome, PollError> {
        let bars = self.market.candles(&self.product, self.granularity_secs)?;
        self.evaluate(&bars)
    }

    /// Evaluate an already-fetched candle series.
    pub fn evaluate(&mut self, bars: &[Bar]) -> Result<StepOutcome, PollError> {
        let need = self.settings.min_bars.max(1);
        let Some(last) = bars.last().filter(|_| bars.len() >= need) else {
            return Ok(StepOutcome::NotEnoughBars {
                have: bars.len(),
                need,
            });
        };
        let time = last.time;
        let price = last.close;

        if self.settings.confirm_on_close && self.last_bar == Some(time) {
            return Ok(StepOutcome::AwaitingClose);
        }

        if self.cooldown_left > 0 {
            self.cooldown_left -= 1;
            self.last_bar = Some(time);
            tracing::debug!(remaining = self.cooldown_left, "cooldown");
            return Ok(StepOutcome::Cooldown {
                remaining: self.cooldown_left,
            });
        }

        let cols = SeriesColumns::from_bars(bars);
        let htf_closes = if self.strategy.needs_htf() {
            closes(&resample(bars, self.htf_factor))
        } else {
            Vec::new()
        };
        let mut view = cols.view();
        if self.strategy.needs_htf() {
            view = view.with_htf(&htf_closes);
        }
        let signal = self.strategy.generate_signal(&view);

        let mut report = StepReport {
            time,
            product: self.product.clone(),
            signal,
            price,
            leverage: self.strategy.last_leverage(),
            stop: self.strategy.stop(),
            take: self.strategy.take(),
            round: None,
        };
        tracing::info!(
            product = %self.product,
            signal = %signal,
            price,
            leverage = ?report.leverage,
            stop = ?report.stop,
            take = ?report.take,
            "bar evaluated"
        );

        if let Some(side) = signal.side() {
            self.cooldown_left = self.settings.cooldown_bars;
            match self.desk.as_mut() {
                Some(desk) if self.settings.trading_enabled => {
                    let rr = match (report.stop, report.take) {
                        (Some(stop), Some(take)) if (price - stop).abs() > 0.0 => {
                            Some((take - price).abs() / (price - stop).abs())
                        }
                        _ => None,
                    };
                    let req = TradeRequest::new(&self.product, side, price)
                        .with_stop(report.stop)
                        .with_rr(rr)
                        .with_bars(bars);
                    match run_one_round(
                        &mut desk.session,
                        &mut desk.risk,
                        desk.venue.as_mut(),
                        &req,
                    ) {
                        Ok(outcome) => report.round = Some(outcome),
                        Err(RoundError::Session(SessionError::SessionComplete { rounds })) => {
                            tracing::info!(
                                rounds,
                                "ladder complete; trading disabled until the session is reset"
                            );
                            self.settings.trading_enabled = false;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                _ => {
                    tracing::info!(product = %self.product, signal = %signal, "trading disabled; signal not executed");
                }
            }
        }

        self.last_bar = Some(time);
        Ok(StepOutcome::Evaluated(Box::new(report)))
    }

    fn pause_after(&self, outcome: &StepOutcome) -> Duration {
        match outcome {
            StepOutcome::Evaluated(_) => Duration::from_millis(self.settings.poll_interval_ms),
            _ => Duration::from_millis(self.settings.idle_interval_ms),
        }
    }

    /// Poll until `max_steps` steps have run (forever when `None`).
    ///
    /// Market-data failures are logged and retried after the error backoff.
    /// Round errors other than a completed ladder end the loop.
    pub fn run<F>(&mut self, max_steps: Option<u64>, mut on_step: F) -> Result<(), PollError>
    where
        F: FnMut(&StepOutcome),
    {
        let mut steps = 0u64;
        while max_steps.map_or(true, |max| steps < max) {
            steps += 1;
            let pause = match self.step() {
                Ok(outcome) => {
                    on_step(&outcome);
                    self.pause_after(&outcome)
                }
                Err(PollError::Data(e)) => {
                    tracing::warn!(product = %self.product, error = %e, "market data unavailable");
                    Duration::from_millis(self.settings.error_backoff_ms)
                }
                Err(e) => return Err(e),
            };
            if max_steps.map_or(true, |max| steps < max) {
                std::thread::sleep(pause);
            }
        }
        Ok(())
    }
}
