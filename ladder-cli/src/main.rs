//! Ladder CLI: signal polling, orchestrated rounds and session bookkeeping.
//!
//! Commands:
//! - `signal`: poll candles and print strategy signals (optionally trading)
//! - `round`: run one orchestrated round for a given side and entry
//! - `win` / `loss`: report a settled trade to the session
//! - `status`: print the session snapshot
//! - `reset`: start a new ladder, optionally keeping the vault
//! - `set-stake`: override the ladder stake
//! - `daily-limit`: arm or check the daily loss limit
//! - `config`: print the validated configuration as TOML

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ladder_core::domain::{Side, TradeResult};
use ladder_core::risk::{RiskEngine, TradeRequest};
use ladder_core::round::run_one_round;
use ladder_core::session::SessionController;
use ladder_core::strategy::build_strategy;
use ladder_core::venue::LoggingVenue;
use ladder_runner::config::load_dotenv;
use ladder_runner::{
    build_market, init_logging, AppConfig, LoggingOptions, Poller, StepOutcome, TradingDesk,
};

#[derive(Parser)]
#[command(name = "ladder", about = "Ladder: bounded-round trading sessions with a vault siphon")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true, env = "LADDER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for a log file in addition to stderr.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll candles and print one line per evaluated bar.
    Signal {
        /// Stop after this many polls (runs until interrupted otherwise).
        #[arg(long)]
        steps: Option<u64>,

        /// Hand buy/sell signals to the round orchestrator.
        #[arg(long, default_value_t = false)]
        trade: bool,
    },
    /// Run one orchestrated round.
    Round {
        /// long/buy or short/sell.
        #[arg(long)]
        side: Side,

        #[arg(long)]
        entry: f64,

        /// Stop price; derived from ATR over fresh candles when omitted.
        #[arg(long)]
        stop: Option<f64>,

        /// Reward/risk multiple for the target; defaults to risk.tp_rr.
        #[arg(long)]
        rr: Option<f64>,

        /// Defaults to market.product.
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Report a winning trade.
    Win {
        #[command(flatten)]
        fill: FillArgs,
    },
    /// Report a losing trade.
    Loss {
        #[command(flatten)]
        fill: FillArgs,
    },
    /// Print the session snapshot as JSON.
    Status,
    /// Start a new ladder.
    Reset {
        /// Keep the vault balance (zeroed otherwise).
        #[arg(long, default_value_t = false)]
        keep_vault: bool,

        /// New ladder stake; negative amounts are floored at 0.
        #[arg(long, allow_negative_numbers = true)]
        stake: Option<f64>,
    },
    /// Override the ladder stake; negative amounts are floored at 0.
    SetStake {
        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },
    /// Arm the daily loss limit, or check a balance against it.
    DailyLimit {
        /// Day-start balance to arm the limit with.
        #[arg(long)]
        start_balance: Option<f64>,

        /// Maximum daily loss as a fraction; defaults to risk.max_daily_loss.
        #[arg(long)]
        pct: Option<f64>,

        /// Check this balance against the armed limit instead.
        #[arg(long, conflicts_with = "start_balance")]
        check: Option<f64>,
    },
    /// Print the validated configuration.
    Config,
}

#[derive(clap::Args)]
struct FillArgs {
    /// Signed filled quantity (negative for shorts).
    #[arg(long, allow_hyphen_values = true)]
    qty: f64,

    #[arg(long)]
    entry: f64,

    #[arg(long)]
    exit: f64,

    #[arg(long, default_value_t = 0.0)]
    fees: f64,
}

impl FillArgs {
    fn result(&self) -> Result<TradeResult> {
        if self.entry <= 0.0 || self.exit <= 0.0 {
            bail!("--entry and --exit must be positive");
        }
        if self.fees < 0.0 {
            bail!("--fees must not be negative");
        }
        Ok(TradeResult::new(self.qty, self.entry, self.exit, self.fees))
    }
}

fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())
        .with_context(|| match &cli.config {
            Some(p) => format!("loading {}", p.display()),
            None => "loading default configuration".to_string(),
        })?;

    let _logging = init_logging(&LoggingOptions {
        level: config.runner.log_level.clone(),
        file_level: config.runner.log_file_level.clone(),
        log_dir: cli.log_dir.clone().or_else(|| config.runner.log_dir.clone()),
        ..LoggingOptions::default()
    })?;

    match cli.command {
        Commands::Signal { steps, trade } => run_signal(config, steps, trade),
        Commands::Round {
            side,
            entry,
            stop,
            rr,
            symbol,
        } => run_round(&config, side, entry, stop, rr, symbol),
        Commands::Win { fill } => {
            let mut session = SessionController::open(config.session.clone());
            session.on_win(&fill.result()?)?;
            print_json(&session.snapshot())
        }
        Commands::Loss { fill } => {
            let mut session = SessionController::open(config.session.clone());
            session.on_loss(&fill.result()?)?;
            print_json(&session.snapshot())
        }
        Commands::Status => {
            let session = SessionController::open(config.session.clone());
            print_json(&serde_json::json!({
                "status": session.status(),
                "can_trade_now": session.can_trade_now(),
                "planned_notional": session.planned_notional(),
                "snapshot": session.snapshot(),
            }))
        }
        Commands::Reset { keep_vault, stake } => {
            let mut session = SessionController::open(config.session.clone());
            session.reset_session(keep_vault, stake)?;
            print_json(&session.snapshot())
        }
        Commands::SetStake { amount } => {
            let mut session = SessionController::open(config.session.clone());
            session.set_stake(amount)?;
            print_json(&session.snapshot())
        }
        Commands::DailyLimit {
            start_balance,
            pct,
            check,
        } => run_daily_limit(&config, start_balance, pct, check),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_signal(mut config: AppConfig, steps: Option<u64>, trade: bool) -> Result<()> {
    config.runner.trading_enabled |= trade;
    let strategy = build_strategy(&config.strategy);
    let market = build_market(&config.market)?;

    println!(
        "ladder started | product={} | strategy={} | source={} | trading={}",
        config.market.product,
        strategy.name(),
        market.name(),
        if config.runner.trading_enabled { "ON" } else { "OFF" },
    );
    let ema = &config.strategy.ema_atr;
    println!(
        "EMA({},{}) ATR(p={} min={}) RSI(p={} ob={} os={}) leverage={:?} default={}",
        ema.fast,
        ema.slow,
        ema.atr_period,
        ema.atr_min,
        ema.rsi_period,
        ema.rsi_overbought,
        ema.rsi_oversold,
        ema.leverage_schedule,
        ema.effective_leverage_default(),
    );

    let mut poller = Poller::new(strategy, market, &config.market, config.runner.clone());
    if config.runner.trading_enabled {
        poller = poller.with_desk(TradingDesk {
            session: SessionController::open(config.session.clone()),
            risk: RiskEngine::new(config.risk.clone()),
            venue: Box::new(LoggingVenue::new()),
        });
    }

    poller.run(steps, |outcome| {
        if let StepOutcome::Evaluated(report) = outcome {
            println!("{report}");
            if let Some(round) = &report.round {
                match serde_json::to_string(round) {
                    Ok(line) => println!("round: {line}"),
                    Err(e) => tracing::warn!(error = %e, "failed to render round outcome"),
                }
            }
        }
    })?;
    Ok(())
}

fn run_round(
    config: &AppConfig,
    side: Side,
    entry: f64,
    stop: Option<f64>,
    rr: Option<f64>,
    symbol: Option<String>,
) -> Result<()> {
    let symbol = symbol.unwrap_or_else(|| config.market.product.clone());
    let bars = match stop {
        Some(_) => Vec::new(),
        None => build_market(&config.market)?
            .candles(&symbol, config.market.granularity_secs)
            .context("fetching candles for the ATR stop")?,
    };

    let mut req = TradeRequest::new(&symbol, side, entry)
        .with_stop(stop)
        .with_rr(rr);
    if !bars.is_empty() {
        req = req.with_bars(&bars);
    }

    let mut session = SessionController::open(config.session.clone());
    let mut risk = RiskEngine::new(config.risk.clone());
    let mut venue = LoggingVenue::new();
    let outcome = run_one_round(&mut session, &mut risk, &mut venue, &req)?;
    print_json(&outcome)
}

fn run_daily_limit(
    config: &AppConfig,
    start_balance: Option<f64>,
    pct: Option<f64>,
    check: Option<f64>,
) -> Result<()> {
    let mut session = SessionController::open(config.session.clone());
    if let Some(balance) = check {
        let ok = session.daily_limit_ok(balance);
        print_json(&serde_json::json!({ "balance": balance, "ok": ok }))?;
        if !ok {
            std::process::exit(2);
        }
        return Ok(());
    }

    let Some(start) = start_balance else {
        bail!("one of --start-balance or --check is required");
    };
    let pct = pct.unwrap_or(config.risk.max_daily_loss);
    if start <= 0.0 {
        bail!("--start-balance must be positive");
    }
    if !(pct > 0.0 && pct <= 1.0) {
        bail!("--pct must be in (0, 1]");
    }
    session.set_daily_limit(start, pct)?;
    print_json(&session.snapshot())
}
