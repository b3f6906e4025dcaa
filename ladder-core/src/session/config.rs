//! Session controller parameters.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Leverage per round; the last rung repeats.
    pub leverage_schedule: Vec<f64>,
    /// Wins at or above this amount move it to the vault.
    pub siphon_amount: f64,
    pub max_rounds: u32,
    pub timezone: Tz,
    #[serde(with = "hhmm")]
    pub window_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub window_end: NaiveTime,
    pub state_path: PathBuf,
    /// `None` disables the event log.
    pub event_log_path: Option<PathBuf>,
    pub dry_run: bool,
    /// Ladder bank of a fresh session.
    pub starting_stake: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            leverage_schedule: vec![10.0, 10.0, 8.0, 7.0],
            siphon_amount: 500.0,
            max_rounds: 4,
            timezone: chrono_tz::America::Phoenix,
            window_start: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            window_end: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or_default(),
            state_path: PathBuf::from("ladder_session.json"),
            event_log_path: Some(PathBuf::from("ladder_rounds.jsonl")),
            dry_run: true,
            starting_stake: 100.0,
        }
    }
}

impl SessionConfig {
    /// Human-readable trade window, e.g. `06:00-14:00 America/Phoenix`.
    pub fn window_label(&self) -> String {
        format!(
            "{}-{} {}",
            self.window_start.format("%H:%M"),
            self.window_end.format("%H:%M"),
            self.timezone.name()
        )
    }

    /// Leverage for round `round_idx`. An empty schedule means 1x.
    pub fn leverage_for(&self, round_idx: u32) -> f64 {
        let schedule = &self.leverage_schedule;
        if schedule.is_empty() {
            return 1.0;
        }
        schedule[(round_idx as usize).min(schedule.len() - 1)]
    }
}

/// `HH:MM` (seconds optional on input).
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Result<NaiveTime, chrono::ParseError> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_ladder_plan() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.leverage_schedule, vec![10.0, 10.0, 8.0, 7.0]);
        assert_eq!(cfg.window_label(), "06:00-14:00 America/Phoenix");
        assert!(cfg.dry_run);
    }

    #[test]
    fn leverage_sticks_to_last_rung() {
        let cfg = SessionConfig::default();
        let rungs: Vec<f64> = (0..6).map(|i| cfg.leverage_for(i)).collect();
        assert_eq!(rungs, vec![10.0, 10.0, 8.0, 7.0, 7.0, 7.0]);

        let empty = SessionConfig {
            leverage_schedule: vec![],
            ..SessionConfig::default()
        };
        assert_eq!(empty.leverage_for(3), 1.0);
    }

    #[test]
    fn window_times_parse_with_or_without_seconds() {
        assert_eq!(hhmm::parse("06:30").unwrap(), NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(hhmm::parse("14:00:00").unwrap(), NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert!(hhmm::parse("25:00").is_err());
    }

    #[test]
    fn deserializes_partial_json() {
        let cfg: SessionConfig = serde_json::from_str(
            r#"{"timezone":"America/New_York","window_start":"09:30","max_rounds":2}"#,
        )
        .unwrap();
        assert_eq!(cfg.timezone, chrono_tz::America::New_York);
        assert_eq!(cfg.window_start, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(cfg.max_rounds, 2);
        assert_eq!(cfg.siphon_amount, 500.0);
    }
}
