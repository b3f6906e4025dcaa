//! Config → market → strategy → poller, end to end on synthetic candles.

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use ladder_core::events::JsonlEventLog;
use ladder_core::risk::RiskEngine;
use ladder_core::round::RoundStatus;
use ladder_core::session::{FixedClock, SessionController};
use ladder_core::strategy::{build_strategy, StrategyKind};
use ladder_core::venue::LoggingVenue;
use ladder_runner::{
    build_market, AppConfig, MarketData, MarketSource, Poller, StepOutcome, SyntheticMarket,
    TradingDesk,
};

fn config() -> AppConfig {
    let mut cfg = AppConfig::from_toml(
        r#"
[strategy]
kind = "ema_atr_trend_mtf"
htf_ema = 20

[market]
source = "synthetic"
synthetic_bars = 300

[runner]
min_bars = 60
cooldown_bars = 0
confirm_on_close = false
poll_interval_ms = 0
idle_interval_ms = 0
error_backoff_ms = 0
"#,
    )
    .unwrap();
    cfg.validate().unwrap();
    cfg.runner.trading_enabled = true;
    cfg
}

#[test]
fn configured_loop_evaluates_synthetic_candles() {
    let cfg = config();
    let market = build_market(&cfg.market).unwrap();
    assert_eq!(market.name(), "synthetic");

    let mut poller = Poller::new(
        build_strategy(&cfg.strategy),
        market,
        &cfg.market,
        cfg.runner.clone(),
    );
    let mut evaluated = 0;
    poller
        .run(Some(5), |o| {
            if let StepOutcome::Evaluated(r) = o {
                assert_eq!(r.product, "BTC-USD");
                assert!(r.price > 0.0);
                evaluated += 1;
            }
        })
        .unwrap();
    assert_eq!(evaluated, 5);
    assert_eq!(poller.strategy().name(), StrategyKind::EmaAtrTrendMtf.to_string());
}

#[test]
fn replayed_signals_drive_dry_run_rounds() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config();
    cfg.strategy.kind = StrategyKind::EmaAtrTrend;
    cfg.session.state_path = dir.path().join("session.json");
    cfg.session.event_log_path = Some(dir.path().join("rounds.jsonl"));

    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap());
    let desk = TradingDesk {
        session: SessionController::with_parts(
            cfg.session.clone(),
            Arc::new(clock),
            Box::new(JsonlEventLog::new(dir.path().join("rounds.jsonl"))),
        ),
        risk: RiskEngine::new(cfg.risk.clone()),
        venue: Box::new(LoggingVenue::new()),
    };

    let bars = SyntheticMarket::new(600)
        .ending_at(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap())
        .candles("BTC-USD", 300)
        .unwrap();
    let mut poller = Poller::new(
        build_strategy(&cfg.strategy),
        Box::new(SyntheticMarket::new(0)),
        &cfg.market,
        cfg.runner.clone(),
    )
    .with_desk(desk);

    // replay bar by bar; every actionable signal becomes a round until the
    // ladder completes
    let mut rounds = Vec::new();
    for end in cfg.runner.min_bars..=bars.len() {
        match poller.evaluate(&bars[..end]) {
            Ok(StepOutcome::Evaluated(r)) => {
                if let Some(round) = r.round {
                    rounds.push(round);
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    assert!(!rounds.is_empty(), "synthetic walk produced no entries");
    let settled = rounds
        .iter()
        .filter(|r| matches!(r.status, RoundStatus::SimulatedWin { .. }))
        .count();
    let session = &poller.desk().unwrap().session;
    assert_eq!(session.state().round_idx as usize, settled);
    assert!(session.state().round_idx <= cfg.session.max_rounds);
}

#[test]
fn market_source_round_trips_through_config() {
    let mut cfg = AppConfig::default();
    cfg.market.source = MarketSource::Csv;
    cfg.market.csv_path = Some("prices.csv".into());
    let parsed = AppConfig::from_toml(&cfg.to_toml().unwrap()).unwrap();
    assert_eq!(parsed.market.source, MarketSource::Csv);
    assert_eq!(parsed.market.csv_path, cfg.market.csv_path);
}
