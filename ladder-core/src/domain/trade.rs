//! Trade ideas and trade results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a proposed or open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1.0 for long, -1.0 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(Side::Long),
            "short" | "sell" => Ok(Side::Short),
            other => Err(format!("unknown side '{other}' (expected long or short)")),
        }
    }
}

/// A validated, sized trade proposal produced by the risk engine.
///
/// Immutable once produced. Only constructed when risk and reward per unit
/// are both positive and the reward-to-risk ratio clears the configured floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIdea {
    pub side: Side,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub size: f64,
    pub leverage: f64,
    pub rrr: f64,
}

impl TradeIdea {
    pub fn risk_per_unit(&self) -> f64 {
        (self.entry - self.stop) * self.side.sign()
    }

    pub fn reward_per_unit(&self) -> f64 {
        (self.target - self.entry) * self.side.sign()
    }
}

/// Outcome of a filled round as reported by the execution collaborator.
///
/// `filled_qty` is signed: positive for longs, negative for shorts, so that
/// `pnl` stays correct for both directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub filled_qty: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    #[serde(default)]
    pub fees: f64,
}

impl TradeResult {
    pub fn new(filled_qty: f64, entry_price: f64, exit_price: f64, fees: f64) -> Self {
        Self {
            filled_qty,
            entry_price,
            exit_price,
            fees,
        }
    }

    /// Realized profit: `(exit - entry) * qty - fees`.
    pub fn pnl(&self) -> f64 {
        (self.exit_price - self.entry_price) * self.filled_qty - self.fees
    }
}
