//! Ladder Core: indicators, strategy state machines, risk sizing, session
//! ladder, round orchestration.
//!
//! This crate contains the decision and bankroll logic:
//! - Domain types (bars, trade ideas, trade results)
//! - Indicator library over aligned numeric series (NaN = undefined)
//! - Strategy state machines emitting buy/sell/hold
//! - Risk engine validating and sizing one proposed trade
//! - Session controller sequencing bounded rounds over a ladder and a vault
//! - Round orchestrator composing risk and session per round
//!
//! Everything here is synchronous and single-writer; I/O is limited to the
//! session state file and the event log.

pub mod domain;
pub mod events;
pub mod indicators;
pub mod risk;
pub mod round;
pub mod session;
pub mod strategy;
pub mod venue;

pub use domain::{Bar, Side, TradeIdea, TradeResult};
pub use risk::{RiskConfig, RiskEngine, RiskError, TradeRequest};
pub use round::{run_one_round, RoundError, RoundOutcome, RoundStatus, SkipReason};
pub use session::{SessionConfig, SessionController, SessionError, SessionSnapshot};
pub use strategy::{build_strategy, MarketView, Signal, Strategy, StrategySettings};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types can move to a worker thread.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<TradeIdea>();
        require_sync::<TradeIdea>();
        require_send::<TradeResult>();
        require_sync::<TradeResult>();

        require_send::<strategy::EmaAtrTrend>();
        require_sync::<strategy::EmaAtrTrend>();
        require_send::<strategy::EmaAtrTrendMtf>();
        require_send::<strategy::SmaCross>();
        require_send::<Box<dyn Strategy>>();

        require_send::<RiskEngine>();
        require_sync::<RiskEngine>();
        require_send::<SessionController>();
        require_send::<session::FixedClock>();
        require_sync::<session::FixedClock>();
        require_send::<events::JsonlEventLog>();
        require_send::<venue::LoggingVenue>();

        require_send::<RoundOutcome>();
        require_sync::<RoundOutcome>();
    }

    /// Strategies see prices only: the trait has no session or risk parameter.
    #[test]
    fn strategy_trait_takes_prices_only() {
        fn _check_trait_object_builds(strat: &mut dyn Strategy, view: &MarketView<'_>) -> Signal {
            strat.generate_signal(view)
        }
    }
}
