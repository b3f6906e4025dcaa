//! Persisted session record.

use serde::{Deserialize, Serialize};

/// Bank balances and round counter of a ladder session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub round_idx: u32,
    pub vault_bank: f64,
    pub ladder_bank: f64,
    pub daily_start_balance: Option<f64>,
    pub daily_loss: f64,
    pub max_daily_loss_pct: Option<f64>,
}

impl SessionState {
    pub fn fresh(starting_stake: f64) -> Self {
        Self {
            round_idx: 0,
            vault_bank: 0.0,
            ladder_bank: starting_stake.max(0.0),
            daily_start_balance: None,
            daily_loss: 0.0,
            max_daily_loss_pct: None,
        }
    }
}

/// On-disk form: the state plus the local time it was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSession<'a> {
    #[serde(flatten)]
    pub state: &'a SessionState,
    pub timestamp: String,
}

/// Loose on-disk form: any field may be missing and falls back to the
/// controller's defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PartialSession {
    pub round_idx: Option<u32>,
    pub vault_bank: Option<f64>,
    pub ladder_bank: Option<f64>,
    pub daily_start_balance: Option<f64>,
    pub daily_loss: Option<f64>,
    pub max_daily_loss_pct: Option<f64>,
    pub timestamp: Option<String>,
}

impl PartialSession {
    pub fn merge_onto(self, defaults: SessionState) -> SessionState {
        SessionState {
            round_idx: self.round_idx.unwrap_or(defaults.round_idx),
            vault_bank: self.vault_bank.unwrap_or(defaults.vault_bank),
            ladder_bank: self.ladder_bank.unwrap_or(defaults.ladder_bank).max(0.0),
            daily_start_balance: self.daily_start_balance.or(defaults.daily_start_balance),
            daily_loss: self.daily_loss.unwrap_or(defaults.daily_loss),
            max_daily_loss_pct: self.max_daily_loss_pct.or(defaults.max_daily_loss_pct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_form_has_flat_fields() {
        let state = SessionState::fresh(100.0);
        let stored = StoredSession {
            state: &state,
            timestamp: "2024-03-01T08:00:00-07:00".into(),
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["round_idx"], 0);
        assert_eq!(value["ladder_bank"], 100.0);
        assert!(value["daily_start_balance"].is_null());
        assert_eq!(value["timestamp"], "2024-03-01T08:00:00-07:00");
    }

    #[test]
    fn partial_record_keeps_defaults() {
        let partial: PartialSession =
            serde_json::from_str(r#"{"round_idx": 2, "vault_bank": 500.0}"#).unwrap();
        let state = partial.merge_onto(SessionState::fresh(100.0));
        assert_eq!(state.round_idx, 2);
        assert_eq!(state.vault_bank, 500.0);
        assert_eq!(state.ladder_bank, 100.0);
        assert_eq!(state.daily_start_balance, None);
    }

    #[test]
    fn negative_stake_is_floored() {
        assert_eq!(SessionState::fresh(-5.0).ladder_bank, 0.0);
    }
}
