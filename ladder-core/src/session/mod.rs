//! Session ladder controller.
//!
//! A session is a bounded sequence of rounds. Each round trades the ladder
//! bank at the leverage rung for that round; wins at or above the siphon
//! amount move that amount into the vault, which is never risked again.
//! The controller owns the persisted [`SessionState`] and re-persists it on
//! every mutation.
//!
//! Single-writer: callers must not drive one controller (or one state file)
//! from several threads or processes at once.

pub mod clock;
pub mod config;
pub mod controller;
pub mod state;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SessionConfig;
pub use controller::{SessionController, SessionStatus};
pub use state::SessionState;
pub use store::SessionStore;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session complete after {rounds} rounds; reset before starting a new round")]
    SessionComplete { rounds: u32 },

    #[error("outside trade window {window} (local time {local})")]
    WindowClosed { window: String, local: String },

    #[error("dry run is enabled; refusing live action")]
    GuardViolation,

    #[error("failed to persist session state to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode session state: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Point-in-time view of the session for reports and the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// 1-based round about to be played.
    pub round: u32,
    pub max_rounds: u32,
    pub leverage: f64,
    pub ladder_bank: f64,
    pub vault_bank: f64,
    pub dry_run: bool,
    pub window: String,
    pub daily_start_balance: Option<f64>,
    pub daily_loss: f64,
}

pub(crate) fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
