//! Append-only session event log.
//!
//! Every session mutation emits one record: a timestamp, the event kind with
//! its fields, and a snapshot of the session after the mutation. The JSONL
//! sink writes one JSON object per line, so a partial write only ever damages
//! the last line.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::session::SessionSnapshot;

/// Session mutation kinds, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    RoundStart {
        round: u32,
    },
    Win {
        pnl: f64,
    },
    Loss {
        pnl: f64,
    },
    SessionReset {
        keep_vault: bool,
        new_stake: Option<f64>,
    },
    StakeSet {
        stake: f64,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::RoundStart { .. } => "round_start",
            SessionEvent::Win { .. } => "win",
            SessionEvent::Loss { .. } => "loss",
            SessionEvent::SessionReset { .. } => "session_reset",
            SessionEvent::StakeSet { .. } => "stake_set",
        }
    }
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Seconds since the Unix epoch.
    pub ts: f64,
    #[serde(flatten)]
    pub event: SessionEvent,
    pub snapshot: SessionSnapshot,
}

/// Destination for session events.
pub trait EventSink: Send {
    fn record(&mut self, record: &EventRecord) -> io::Result<()>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&mut self, _record: &EventRecord) -> io::Result<()> {
        Ok(())
    }
}

/// JSONL file sink.
#[derive(Debug, Clone)]
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record, skipping blank and malformed lines.
    pub fn read_all(&self) -> io::Result<Vec<EventRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::debug!(path = %self.path.display(), error = %e, "skipping malformed event line"),
            }
        }
        Ok(records)
    }
}

impl EventSink for JsonlEventLog {
    fn record(&mut self, record: &EventRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            round: 1,
            max_rounds: 4,
            leverage: 10.0,
            ladder_bank: 100.0,
            vault_bank: 0.0,
            dry_run: true,
            window: "06:00-14:00 America/Phoenix".into(),
            daily_start_balance: None,
            daily_loss: 0.0,
        }
    }

    #[test]
    fn record_serializes_flat() {
        let record = EventRecord {
            ts: 1_700_000_000.5,
            event: SessionEvent::RoundStart { round: 1 },
            snapshot: snapshot(),
        };
        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["event"], "round_start");
        assert_eq!(value["round"], 1);
        assert_eq!(value["snapshot"]["leverage"], 10.0);
        assert_eq!(value["ts"], 1_700_000_000.5);
    }

    #[test]
    fn jsonl_appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = JsonlEventLog::new(dir.path().join("nested").join("rounds.jsonl"));

        for event in [
            SessionEvent::Win { pnl: 600.0 },
            SessionEvent::StakeSet { stake: 50.0 },
        ] {
            log.record(&EventRecord {
                ts: 1.0,
                event,
                snapshot: snapshot(),
            })
            .unwrap();
        }

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event.kind(), "win");
        assert_eq!(records[1].event, SessionEvent::StakeSet { stake: 50.0 });
    }

    #[test]
    fn read_all_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rounds.jsonl");
        let mut log = JsonlEventLog::new(&path);
        log.record(&EventRecord {
            ts: 1.0,
            event: SessionEvent::Loss { pnl: -20.0 },
            snapshot: snapshot(),
        })
        .unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();

        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlEventLog::new(dir.path().join("absent.jsonl"));
        assert!(log.read_all().unwrap().is_empty());
    }
}
