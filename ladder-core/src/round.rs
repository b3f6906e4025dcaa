//! Round orchestrator: propose, cap, then execute or simulate one round.
//!
//! 1. Skip (no mutation) when outside the trade window.
//! 2. Start the round on the session.
//! 3. Size with the risk engine at the session's per-round leverage.
//! 4. Cap the quantity by the ladder stake.
//! 5. Dry run: book an idealized fill at the target as a win. Live: pass the
//!    guard and hand the order to the venue.
//!
//! The risk engine's leverage cap is restored on every exit path.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::domain::{TradeIdea, TradeResult};
use crate::risk::{RiskEngine, RiskError, TradeRequest};
use crate::session::{SessionController, SessionError, SessionSnapshot};
use crate::venue::{ExecutionError, ExecutionVenue, OrderTicket};

#[derive(Debug, Error)]
pub enum RoundError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Why a round produced no trade.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    WindowClosed,
    Risk(RiskError),
    QtyZeroAfterCaps,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::WindowClosed => write!(f, "window_closed"),
            SkipReason::Risk(e) => write!(f, "risk_error:{e}"),
            SkipReason::QtyZeroAfterCaps => write!(f, "qty_zero_after_caps"),
        }
    }
}

impl Serialize for SkipReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoundStatus {
    Skipped {
        reason: SkipReason,
    },
    SimulatedWin {
        qty: f64,
        idea: TradeIdea,
        fill: TradeResult,
    },
    LiveTradeSent {
        qty: f64,
        idea: TradeIdea,
        ticket: OrderTicket,
    },
}

/// Result of one round plus the session snapshot taken after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundOutcome {
    #[serde(flatten)]
    pub status: RoundStatus,
    pub snapshot: SessionSnapshot,
}

impl RoundOutcome {
    fn new(status: RoundStatus, session: &SessionController) -> Self {
        Self {
            status,
            snapshot: session.snapshot(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, RoundStatus::Skipped { .. })
    }
}

/// Run one round for `req`.
///
/// `Err` is reserved for fatal conditions: a complete session, the dry-run
/// guard, persistence failures and venue errors. Everything else is a skip.
pub fn run_one_round(
    session: &mut SessionController,
    risk: &mut RiskEngine,
    venue: &mut dyn ExecutionVenue,
    req: &TradeRequest<'_>,
) -> Result<RoundOutcome, RoundError> {
    if !session.can_trade_now() {
        tracing::info!(symbol = req.symbol, window = %session.config().window_label(), "round skipped: window closed");
        return Ok(RoundOutcome::new(
            RoundStatus::Skipped {
                reason: SkipReason::WindowClosed,
            },
            session,
        ));
    }

    session.start_round()?;

    let risk = risk.override_leverage(session.leverage());
    let idea = match risk.suggest_trade(req, session.planned_stake()) {
        Ok(idea) => idea,
        Err(RiskError::NonPositiveSize { .. }) => {
            tracing::info!(symbol = req.symbol, "round skipped: zero quantity after caps");
            return Ok(RoundOutcome::new(
                RoundStatus::Skipped {
                    reason: SkipReason::QtyZeroAfterCaps,
                },
                session,
            ));
        }
        Err(e) => {
            tracing::info!(symbol = req.symbol, error = %e, "round skipped: risk rejected");
            return Ok(RoundOutcome::new(
                RoundStatus::Skipped {
                    reason: SkipReason::Risk(e),
                },
                session,
            ));
        }
    };

    let qty = session.planned_qty(req.entry).min(idea.size);
    if qty.is_nan() || qty <= 0.0 {
        tracing::info!(symbol = req.symbol, "round skipped: zero quantity after caps");
        return Ok(RoundOutcome::new(
            RoundStatus::Skipped {
                reason: SkipReason::QtyZeroAfterCaps,
            },
            session,
        ));
    }

    if session.dry_run() {
        let fill = TradeResult::new(qty * idea.side.sign(), idea.entry, idea.target, 0.0);
        session.on_win(&fill)?;
        tracing::info!(symbol = req.symbol, qty, pnl = fill.pnl(), "dry run: simulated win");
        return Ok(RoundOutcome::new(
            RoundStatus::SimulatedWin { qty, idea, fill },
            session,
        ));
    }

    session.require_live()?;
    let ticket = venue.submit(req.symbol, &idea, qty)?;
    Ok(RoundOutcome::new(
        RoundStatus::LiveTradeSent { qty, idea, ticket },
        session,
    ))
}
