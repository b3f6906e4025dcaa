//! Position state owned by a single strategy instance.

use crate::domain::Side;
use serde::{Deserialize, Serialize};

/// Current position of a strategy.
///
/// `take` is `None` when the take-profit distance is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PositionState {
    #[default]
    Flat,
    Long {
        entry: f64,
        stop: f64,
        take: Option<f64>,
    },
    Short {
        entry: f64,
        stop: f64,
        take: Option<f64>,
    },
}

impl PositionState {
    /// Open a position on `side` with stop and take derived from ATR multiples.
    ///
    /// A non-positive `take_atr` leaves the take-profit unset.
    pub fn open(side: Side, entry: f64, atr: f64, risk_atr: f64, take_atr: f64) -> Self {
        let sign = side.sign();
        let stop = entry - sign * risk_atr * atr;
        let take = (take_atr > 0.0).then(|| entry + sign * take_atr * atr);
        match side {
            Side::Long => PositionState::Long { entry, stop, take },
            Side::Short => PositionState::Short { entry, stop, take },
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            PositionState::Flat => None,
            PositionState::Long { .. } => Some(Side::Long),
            PositionState::Short { .. } => Some(Side::Short),
        }
    }

    pub fn entry(&self) -> Option<f64> {
        match self {
            PositionState::Flat => None,
            PositionState::Long { entry, .. } | PositionState::Short { entry, .. } => Some(*entry),
        }
    }

    pub fn stop(&self) -> Option<f64> {
        match self {
            PositionState::Flat => None,
            PositionState::Long { stop, .. } | PositionState::Short { stop, .. } => Some(*stop),
        }
    }

    pub fn take(&self) -> Option<f64> {
        match self {
            PositionState::Flat => None,
            PositionState::Long { take, .. } | PositionState::Short { take, .. } => *take,
        }
    }

    /// Whether `close` hits the stop or the take-profit of the open position.
    pub fn exit_hit(&self, close: f64) -> bool {
        match *self {
            PositionState::Flat => false,
            PositionState::Long { stop, take, .. } => {
                close <= stop || take.is_some_and(|t| close >= t)
            }
            PositionState::Short { stop, take, .. } => {
                close >= stop || take.is_some_and(|t| close <= t)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_long_sets_stop_below_and_take_above() {
        let pos = PositionState::open(Side::Long, 100.0, 2.0, 1.5, 2.0);
        assert_eq!(
            pos,
            PositionState::Long {
                entry: 100.0,
                stop: 97.0,
                take: Some(104.0)
            }
        );
    }

    #[test]
    fn open_short_mirrors_long() {
        let pos = PositionState::open(Side::Short, 100.0, 2.0, 1.5, 2.0);
        assert_eq!(pos.stop(), Some(103.0));
        assert_eq!(pos.take(), Some(96.0));
        assert_eq!(pos.side(), Some(Side::Short));
    }

    #[test]
    fn zero_take_atr_disables_take() {
        let pos = PositionState::open(Side::Long, 100.0, 2.0, 1.5, 0.0);
        assert_eq!(pos.take(), None);
        // only the stop can close it
        assert!(!pos.exit_hit(1_000.0));
        assert!(pos.exit_hit(97.0));
    }

    #[test]
    fn exit_rules_long() {
        let pos = PositionState::open(Side::Long, 100.0, 2.0, 1.5, 2.0);
        assert!(pos.exit_hit(97.0));
        assert!(pos.exit_hit(104.0));
        assert!(!pos.exit_hit(100.0));
    }

    #[test]
    fn exit_rules_short() {
        let pos = PositionState::open(Side::Short, 100.0, 2.0, 1.5, 2.0);
        assert!(pos.exit_hit(103.0));
        assert!(pos.exit_hit(96.0));
        assert!(!pos.exit_hit(100.0));
    }

    #[test]
    fn flat_never_exits() {
        assert!(!PositionState::Flat.exit_hit(0.0));
        assert!(PositionState::default().is_flat());
        assert_eq!(PositionState::Flat.entry(), None);
    }
}
