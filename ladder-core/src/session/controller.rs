use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{
    round_cents, Clock, SessionConfig, SessionError, SessionSnapshot, SessionState, SessionStore,
    SystemClock,
};
use crate::domain::TradeResult;
use crate::events::{EventRecord, EventSink, JsonlEventLog, NullEventSink, SessionEvent};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Complete,
}

pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    store: SessionStore,
    events: Box<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Controller on the system clock, logging to the configured event file.
    pub fn open(config: SessionConfig) -> Self {
        let events: Box<dyn EventSink> = match &config.event_log_path {
            Some(path) => Box::new(JsonlEventLog::new(path.clone())),
            None => Box::new(NullEventSink),
        };
        Self::with_parts(config, Arc::new(SystemClock), events)
    }

    /// Load persisted state from `config.state_path`, falling back to a fresh
    /// session at `config.starting_stake`.
    pub fn with_parts(
        config: SessionConfig,
        clock: Arc<dyn Clock>,
        events: Box<dyn EventSink>,
    ) -> Self {
        let store = SessionStore::new(config.state_path.clone());
        let fresh = SessionState::fresh(config.starting_stake);
        let state = match store.load() {
            Some(partial) => partial.merge_onto(fresh),
            None => fresh,
        };
        tracing::info!(
            path = %store.path().display(),
            round_idx = state.round_idx,
            ladder_bank = state.ladder_bank,
            vault_bank = state.vault_bank,
            "session loaded"
        );
        Self {
            config,
            state,
            store,
            events,
            clock,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn dry_run(&self) -> bool {
        self.config.dry_run
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---- guards ----

    pub fn can_trade_at(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.config.timezone).time();
        self.config.window_start <= local && local <= self.config.window_end
    }

    pub fn can_trade_now(&self) -> bool {
        self.can_trade_at(self.clock.now())
    }

    pub fn status(&self) -> SessionStatus {
        if self.state.round_idx >= self.config.max_rounds {
            SessionStatus::Complete
        } else {
            SessionStatus::Active
        }
    }

    pub fn is_session_complete(&self) -> bool {
        self.status() == SessionStatus::Complete
    }

    /// The sole interlock before any live order.
    pub fn require_live(&self) -> Result<(), SessionError> {
        if self.config.dry_run {
            return Err(SessionError::GuardViolation);
        }
        Ok(())
    }

    /// Record the day-start balance and loss limit; resets the daily tally.
    pub fn set_daily_limit(
        &mut self,
        start_balance: f64,
        max_daily_loss_pct: f64,
    ) -> Result<(), SessionError> {
        let mut next = self.state.clone();
        next.daily_start_balance = Some(start_balance);
        next.max_daily_loss_pct = Some(max_daily_loss_pct);
        next.daily_loss = 0.0;
        self.commit(next)
    }

    /// True when no limit is configured or the drawdown is within it.
    pub fn daily_limit_ok(&self, current_balance: f64) -> bool {
        match (self.state.daily_start_balance, self.state.max_daily_loss_pct) {
            (Some(start), Some(pct)) => start - current_balance <= pct * start,
            _ => true,
        }
    }

    // ---- sizing ----

    pub fn leverage(&self) -> f64 {
        self.config.leverage_for(self.state.round_idx)
    }

    pub fn planned_stake(&self) -> f64 {
        self.state.ladder_bank.max(0.0)
    }

    pub fn planned_notional(&self) -> f64 {
        self.planned_stake() * self.leverage()
    }

    pub fn planned_qty(&self, entry: f64) -> f64 {
        if entry <= 0.0 {
            return 0.0;
        }
        self.planned_notional() / entry
    }

    // ---- lifecycle ----

    pub fn start_round(&mut self) -> Result<(), SessionError> {
        if self.is_session_complete() {
            return Err(SessionError::SessionComplete {
                rounds: self.config.max_rounds,
            });
        }
        let now = self.clock.now();
        if !self.can_trade_at(now) {
            return Err(SessionError::WindowClosed {
                window: self.config.window_label(),
                local: now
                    .with_timezone(&self.config.timezone)
                    .format("%H:%M")
                    .to_string(),
            });
        }
        self.persist(&self.state)?;
        let round = self.state.round_idx.saturating_add(1);
        tracing::info!(round, leverage = self.leverage(), stake = self.planned_stake(), "round started");
        self.log_event(SessionEvent::RoundStart { round });
        Ok(())
    }

    pub fn on_win(&mut self, result: &TradeResult) -> Result<(), SessionError> {
        let pnl = result.pnl();
        let siphon = self.config.siphon_amount;
        let mut next = self.state.clone();
        if pnl >= siphon {
            next.vault_bank += siphon;
            next.ladder_bank += pnl - siphon;
        } else {
            next.ladder_bank = (next.ladder_bank + pnl).max(0.0);
        }
        next.round_idx = next.round_idx.saturating_add(1);
        self.commit(next)?;
        tracing::info!(
            pnl,
            ladder_bank = self.state.ladder_bank,
            vault_bank = self.state.vault_bank,
            "round won"
        );
        self.log_event(SessionEvent::Win { pnl });
        Ok(())
    }

    pub fn on_loss(&mut self, result: &TradeResult) -> Result<(), SessionError> {
        let pnl = result.pnl();
        let mut next = self.state.clone();
        next.ladder_bank = (next.ladder_bank + pnl).max(0.0);
        next.daily_loss += pnl.min(0.0).abs();
        next.round_idx = next.round_idx.saturating_add(1);
        self.commit(next)?;
        tracing::info!(
            pnl,
            ladder_bank = self.state.ladder_bank,
            daily_loss = self.state.daily_loss,
            "round lost"
        );
        self.log_event(SessionEvent::Loss { pnl });
        Ok(())
    }

    pub fn reset_session(
        &mut self,
        keep_vault: bool,
        new_stake: Option<f64>,
    ) -> Result<(), SessionError> {
        let mut next = self.state.clone();
        next.round_idx = 0;
        if !keep_vault {
            next.vault_bank = 0.0;
        }
        if let Some(stake) = new_stake {
            next.ladder_bank = stake.max(0.0);
        }
        self.commit(next)?;
        tracing::info!(keep_vault, ?new_stake, "session reset");
        self.log_event(SessionEvent::SessionReset {
            keep_vault,
            new_stake,
        });
        Ok(())
    }

    /// Manually override the ladder stake, e.g. after a deposit.
    pub fn set_stake(&mut self, amount: f64) -> Result<(), SessionError> {
        let mut next = self.state.clone();
        next.ladder_bank = amount.max(0.0);
        self.commit(next)?;
        tracing::info!(stake = self.state.ladder_bank, "stake set");
        self.log_event(SessionEvent::StakeSet {
            stake: self.state.ladder_bank,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            round: self.state.round_idx.saturating_add(1),
            max_rounds: self.config.max_rounds,
            leverage: self.leverage(),
            ladder_bank: round_cents(self.state.ladder_bank),
            vault_bank: round_cents(self.state.vault_bank),
            dry_run: self.config.dry_run,
            window: self.config.window_label(),
            daily_start_balance: self.state.daily_start_balance,
            daily_loss: round_cents(self.state.daily_loss),
        }
    }

    fn persist(&self, state: &SessionState) -> Result<(), SessionError> {
        let timestamp = self
            .clock
            .now()
            .with_timezone(&self.config.timezone)
            .to_rfc3339();
        self.store.save(state, timestamp)
    }

    /// Write `next` first; memory only moves once the file has.
    fn commit(&mut self, next: SessionState) -> Result<(), SessionError> {
        self.persist(&next)?;
        self.state = next;
        Ok(())
    }

    fn log_event(&mut self, event: SessionEvent) {
        let now = self.clock.now();
        let record = EventRecord {
            ts: now.timestamp_millis() as f64 / 1000.0,
            event,
            snapshot: self.snapshot(),
        };
        if let Err(e) = self.events.record(&record) {
            tracing::warn!(event = record.event.kind(), error = %e, "failed to append session event");
        }
    }
}
