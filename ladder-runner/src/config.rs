//! Application configuration: TOML file, environment overrides, validation.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working dry-run configuration. Precedence is defaults < file < environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use ladder_core::risk::RiskConfig;
use ladder_core::session::SessionConfig;
use ladder_core::strategy::StrategySettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid value for {var}: '{value}' ({reason})")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Where candles come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSource {
    #[default]
    Coinbase,
    Csv,
    Synthetic,
}

impl fmt::Display for MarketSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketSource::Coinbase => "coinbase",
            MarketSource::Csv => "csv",
            MarketSource::Synthetic => "synthetic",
        };
        write!(f, "{s}")
    }
}

impl FromStr for MarketSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coinbase" => Ok(MarketSource::Coinbase),
            "csv" => Ok(MarketSource::Csv),
            "synthetic" => Ok(MarketSource::Synthetic),
            other => Err(format!(
                "unknown market source '{other}' (expected coinbase, csv or synthetic)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub product: String,
    pub source: MarketSource,
    /// Trigger timeframe in seconds (300 = 5m).
    pub granularity_secs: u32,
    /// Trigger bars per higher-timeframe bar (4 × 5m = 20m).
    pub htf_factor: usize,
    pub csv_path: Option<PathBuf>,
    /// Length of the synthetic series.
    pub synthetic_bars: usize,
    /// Serve synthetic candles when the live source fails.
    pub fallback_to_synthetic: bool,
    pub coinbase_url: String,
    pub timeout_secs: u64,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            product: "BTC-USD".into(),
            source: MarketSource::default(),
            granularity_secs: 300,
            htf_factor: 4,
            csv_path: None,
            synthetic_bars: 300,
            fallback_to_synthetic: true,
            coinbase_url: "https://api.exchange.coinbase.com".into(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Evaluate each closed bar once.
    pub confirm_on_close: bool,
    /// Bars to sit out after any buy/sell.
    pub cooldown_bars: u32,
    /// Minimum trigger bars before the strategy is consulted.
    pub min_bars: usize,
    /// Hand actionable signals to the round orchestrator.
    pub trading_enabled: bool,
    pub poll_interval_ms: u64,
    pub idle_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub log_level: String,
    /// Filter for the log file, which rotates at 5 MB keeping 5 backups.
    pub log_file_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            confirm_on_close: true,
            cooldown_bars: 3,
            min_bars: 60,
            trading_enabled: false,
            poll_interval_ms: 800,
            idle_interval_ms: 500,
            error_backoff_ms: 2_000,
            log_level: "info".into(),
            log_file_level: "debug".into(),
            log_dir: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub strategy: StrategySettings,
    pub risk: RiskConfig,
    pub session: SessionConfig,
    pub market: MarketSettings,
    pub runner: RunnerSettings,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Defaults or `path`, then the process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let strat = &mut self.strategy;
        let ema = &mut strat.ema_atr;

        if let Some(v) = env.raw("PRODUCT") {
            self.market.product = v.trim().to_string();
        }
        env.parse("STRATEGY", &mut strat.kind)?;
        env.parse("EMA_FAST", &mut ema.fast)?;
        env.parse("EMA_SLOW", &mut ema.slow)?;
        env.parse("ATR_PERIOD", &mut ema.atr_period)?;
        env.parse("ATR_MIN", &mut ema.atr_min)?;
        env.parse("RISK_ATR", &mut ema.risk_atr)?;
        env.parse("TAKE_ATR", &mut ema.take_atr)?;
        env.parse("DIRECTION", &mut ema.direction)?;
        env.parse("RSI_PERIOD", &mut ema.rsi_period)?;
        env.parse("RSI_OVERBOUGHT", &mut ema.rsi_overbought)?;
        env.parse("RSI_OVERSOLD", &mut ema.rsi_oversold)?;
        env.parse("RSI_BUFFER", &mut ema.rsi_buffer)?;
        if let Some(v) = env.raw("LEVERAGE_SCHEDULE") {
            ema.leverage_schedule =
                parse_schedule(&v).map_err(|reason| ConfigError::Env {
                    var: "LEVERAGE_SCHEDULE",
                    value: v.clone(),
                    reason,
                })?;
        }
        if let Some(v) = env.raw("LEVERAGE_DEFAULT") {
            let parsed = v.trim().parse::<f64>().map_err(|e| ConfigError::Env {
                var: "LEVERAGE_DEFAULT",
                value: v.clone(),
                reason: e.to_string(),
            })?;
            ema.leverage_default = Some(parsed);
        }
        env.parse("TRADE_COUNT_START", &mut ema.trade_count_start)?;
        env.parse("HTF_EMA", &mut strat.htf_ema)?;
        env.parse("HTF_BIAS", &mut strat.htf_bias)?;

        env.parse("MARKET_SOURCE", &mut self.market.source)?;
        env.flag("CONFIRM_ON_CLOSE", &mut self.runner.confirm_on_close);
        env.parse("COOLDOWN_BARS", &mut self.runner.cooldown_bars)?;
        env.flag("LADDER_TRADING_ENABLED", &mut self.runner.trading_enabled);
        if let Some(v) = env.raw("LOG_LEVEL") {
            self.runner.log_level = v.trim().to_lowercase();
        }
        env.flag("DRY_RUN", &mut self.session.dry_run);
        Ok(())
    }

    /// Check every cross-field constraint, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errs = Vec::new();
        let risk = &self.risk;
        let session = &self.session;
        let strat = &self.strategy;
        let ema = &strat.ema_atr;

        if !(risk.risk_per_trade > 0.0 && risk.risk_per_trade < 1.0) {
            errs.push(format!(
                "risk.risk_per_trade must be in (0, 1), got {}",
                risk.risk_per_trade
            ));
        }
        if !(risk.max_daily_loss > 0.0 && risk.max_daily_loss <= 1.0) {
            errs.push(format!(
                "risk.max_daily_loss must be in (0, 1], got {}",
                risk.max_daily_loss
            ));
        }
        if !(risk.min_rrr > 0.0) {
            errs.push(format!("risk.min_rrr must be > 0, got {}", risk.min_rrr));
        }
        if risk.max_positions < 1 {
            errs.push("risk.max_positions must be >= 1".into());
        }
        if !(risk.max_leverage > 0.0) {
            errs.push(format!(
                "risk.max_leverage must be > 0, got {}",
                risk.max_leverage
            ));
        }

        if session.leverage_schedule.is_empty() {
            errs.push("session.leverage_schedule must not be empty".into());
        }
        if session.leverage_schedule.iter().any(|l| !(*l > 0.0)) {
            errs.push("session.leverage_schedule rungs must be > 0".into());
        }
        if !(session.siphon_amount >= 0.0) {
            errs.push(format!(
                "session.siphon_amount must be >= 0, got {}",
                session.siphon_amount
            ));
        }
        if session.max_rounds < 1 {
            errs.push("session.max_rounds must be >= 1".into());
        }
        if session.window_start > session.window_end {
            errs.push(format!(
                "session window must not span midnight ({})",
                session.window_label()
            ));
        }
        if !(session.starting_stake >= 0.0) {
            errs.push(format!(
                "session.starting_stake must be >= 0, got {}",
                session.starting_stake
            ));
        }

        if ema.fast == 0 || ema.fast >= ema.slow {
            errs.push(format!(
                "strategy.fast must be > 0 and < slow, got fast={} slow={}",
                ema.fast, ema.slow
            ));
        }
        if ema.atr_period == 0 || ema.rsi_period == 0 {
            errs.push("strategy.atr_period and strategy.rsi_period must be > 0".into());
        }
        if ema.rsi_oversold >= ema.rsi_overbought {
            errs.push(format!(
                "strategy.rsi_oversold ({}) must be below rsi_overbought ({})",
                ema.rsi_oversold, ema.rsi_overbought
            ));
        }
        if ema.leverage_schedule.iter().any(|l| !(*l > 0.0)) {
            errs.push("strategy.leverage_schedule rungs must be > 0".into());
        }
        if strat.htf_ema == 0 {
            errs.push("strategy.htf_ema must be > 0".into());
        }
        if strat.sma_fast == 0 || strat.sma_fast >= strat.sma_slow {
            errs.push(format!(
                "strategy.sma_fast must be > 0 and < sma_slow, got {} / {}",
                strat.sma_fast, strat.sma_slow
            ));
        }

        if self.market.product.trim().is_empty() {
            errs.push("market.product must not be empty".into());
        }
        if self.market.granularity_secs == 0 {
            errs.push("market.granularity_secs must be > 0".into());
        }
        if self.market.htf_factor == 0 {
            errs.push("market.htf_factor must be >= 1".into());
        }
        if self.market.source == MarketSource::Csv && self.market.csv_path.is_none() {
            errs.push("market.csv_path is required when market.source = \"csv\"".into());
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errs))
        }
    }
}

/// Load `.env` into the process environment if present.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loaded .env");
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable .env");
            None
        }
    }
}

/// `1/true/t/yes/y/on` (any case) is true; anything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "y" | "on"
    )
}

/// Comma-separated leverage rungs; blank entries are skipped.
pub fn parse_schedule(value: &str) -> Result<Vec<f64>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().map_err(|e| format!("'{s}': {e}")))
        .collect()
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn raw(&self, var: &str) -> Option<String> {
        (self.lookup)(var).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, var: &'static str, slot: &mut T) -> Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if let Some(v) = self.raw(var) {
            *slot = v.trim().parse().map_err(|e: T::Err| ConfigError::Env {
                var,
                value: v.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn flag(&self, var: &str, slot: &mut bool) {
        if let Some(v) = self.raw(var) {
            *slot = parse_bool(&v);
        }
    }
}
