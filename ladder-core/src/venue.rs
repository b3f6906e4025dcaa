//! Execution collaborator boundary.
//!
//! A venue accepts a sized trade idea and acknowledges it. Fills are reported
//! back to the session later as a [`TradeResult`](crate::domain::TradeResult).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Side, TradeIdea};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("order rejected by venue: {0}")]
    Rejected(String),

    #[error("venue unavailable: {0}")]
    Unavailable(String),
}

/// Acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub qty: f64,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub leverage: f64,
    pub submitted_at: DateTime<Utc>,
}

pub trait ExecutionVenue: Send {
    fn name(&self) -> &str;

    fn submit(&mut self, symbol: &str, idea: &TradeIdea, qty: f64)
        -> Result<OrderTicket, ExecutionError>;
}

/// Records orders through `tracing` without contacting any broker.
#[derive(Debug, Default)]
pub struct LoggingVenue {
    submitted: u64,
}

impl LoggingVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }
}

impl ExecutionVenue for LoggingVenue {
    fn name(&self) -> &str {
        "logging"
    }

    fn submit(
        &mut self,
        symbol: &str,
        idea: &TradeIdea,
        qty: f64,
    ) -> Result<OrderTicket, ExecutionError> {
        if !(qty.is_finite() && qty > 0.0) {
            return Err(ExecutionError::Rejected(format!("quantity {qty} must be positive")));
        }
        self.submitted += 1;
        let ticket = OrderTicket {
            id: format!("log-{}", self.submitted),
            symbol: symbol.to_string(),
            side: idea.side,
            qty,
            entry: idea.entry,
            stop: idea.stop,
            target: idea.target,
            leverage: idea.leverage,
            submitted_at: Utc::now(),
        };
        tracing::info!(
            id = %ticket.id,
            symbol,
            side = %ticket.side,
            qty,
            entry = ticket.entry,
            stop = ticket.stop,
            target = ticket.target,
            leverage = ticket.leverage,
            "order submitted"
        );
        Ok(ticket)
    }
}
