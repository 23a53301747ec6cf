//! Runtime settings loaded from environment variables (and `.env`).

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::api::ApiCredentials;
use crate::strategy::{ScreenerConfig, StrategyConfig};
use crate::trading::RiskConfig;

pub const DEFAULT_SYMBOL_POOL: &[&str] = &[
    "BTCUSDT",
    "ETHUSDT",
    "SOLUSDT",
    "XRPUSDT",
    "ADAUSDT",
    "DOGEUSDT",
    "1000PEPEUSDT",
    "SUIUSDT",
    "SEIUSDT",
];

#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Option<ApiCredentials>,
    pub testnet: bool,
    pub scan_interval_secs: u64,
    pub symbol_pool: Vec<String>,
    pub max_concurrency: usize,
    pub risk: RiskConfig,
    pub strategy: StrategyConfig,
    pub screener: ScreenerConfig,
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    #[cfg(test)]
    pub fn from_map(vars: &std::collections::HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(&lookup);

        let api_key = vars.first(&["API_KEY", "BINANCE_API_KEY"]);
        let api_secret = vars.first(&["API_SECRET", "BINANCE_API_SECRET"]);
        let credentials = match (api_key, api_secret) {
            (Some(api_key), Some(api_secret)) => Some(ApiCredentials { api_key, api_secret }),
            _ => None,
        };

        let symbol_pool: Vec<String> = match vars.get("SYMBOL_POOL") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_SYMBOL_POOL.iter().map(|s| s.to_string()).collect(),
        };

        let risk_defaults = RiskConfig::default();
        let risk = RiskConfig {
            equity_ratio: vars.parse("EQUITY_RATIO", risk_defaults.equity_ratio)?,
            leverage: vars.parse("LEVERAGE", risk_defaults.leverage)?,
            max_pyramid: vars.parse("MAX_PYRAMID", risk_defaults.max_pyramid)?,
            profit_add_threshold_pct: vars
                .parse("PROFIT_ADD_THRESHOLD_PCT", risk_defaults.profit_add_threshold_pct)?,
            trailing_giveback_pct: vars
                .parse("TRAILING_GIVEBACK_PCT", risk_defaults.trailing_giveback_pct)?,
            max_loss_pct: vars.parse("MAX_LOSS_PCT", risk_defaults.max_loss_pct)?,
            order_max_retries: vars.parse("ORDER_MAX_RETRIES", risk_defaults.order_max_retries)?,
        };

        let s = StrategyConfig::default();
        let strategy = StrategyConfig {
            kline_interval: vars.get("KLINE_INTERVAL").unwrap_or(s.kline_interval),
            kline_limit: vars.parse("KLINE_LIMIT", s.kline_limit)?,
            trend_ema_fast: vars.parse("TREND_EMA_FAST", s.trend_ema_fast)?,
            trend_ema_slow: vars.parse("TREND_EMA_SLOW", s.trend_ema_slow)?,
            macd_signal: vars.parse("MACD_SIGNAL", s.macd_signal)?,
            rsi_period: vars.parse("REVERT_RSI_PERIOD", s.rsi_period)?,
            rsi_oversold: vars.parse("REVERT_RSI_OVERSOLD", s.rsi_oversold)?,
            rsi_overbought: vars.parse("REVERT_RSI_OVERBOUGHT", s.rsi_overbought)?,
            boll_window: vars.parse("BOLL_WINDOW", s.boll_window)?,
            boll_stddev: vars.parse("BOLL_STDDEV", s.boll_stddev)?,
            breakout_enabled: vars.flag("PYRAMID_BREAKOUT_ENABLED", s.breakout_enabled),
            breakout_lookback: vars.parse("PYRAMID_BREAKOUT_LOOKBACK", s.breakout_lookback)?,
        };
        if strategy.trend_ema_fast >= strategy.trend_ema_slow {
            return Err(anyhow!(
                "TREND_EMA_FAST ({}) must be below TREND_EMA_SLOW ({})",
                strategy.trend_ema_fast,
                strategy.trend_ema_slow
            ));
        }

        let sc = ScreenerConfig::default();
        let screener = ScreenerConfig {
            min_quote_volume: vars.parse("VOLUME_MIN_USD", sc.min_quote_volume)?,
            min_funding_rate: vars.parse("FUNDING_RATE_MIN", sc.min_funding_rate)?,
            max_candidates: vars.parse("SCREENER_MAX_CANDIDATES", symbol_pool.len())?,
        };

        Ok(Self {
            credentials,
            testnet: vars.flag("TESTNET", false),
            scan_interval_secs: vars.parse("SCAN_INTERVAL", 60)?,
            symbol_pool,
            max_concurrency: vars.parse("BINANCE_MAX_CONCURRENCY", 5)?,
            risk,
            strategy,
            screener,
        })
    }

    /// Credentials for commands that talk to the exchange.
    pub fn require_credentials(&self) -> Result<ApiCredentials> {
        self.credentials
            .clone()
            .context("API_KEY / API_SECRET (or BINANCE_API_KEY / BINANCE_API_SECRET) not set")
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get(k))
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow!("Invalid {} '{}': {}", key, raw, e)),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(raw) => matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes"),
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use rust_decimal_macros::dec;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_map(&HashMap::new()).unwrap();

        assert!(settings.credentials.is_none());
        assert!(settings.require_credentials().is_err());
        assert!(!settings.testnet);
        assert_eq!(settings.scan_interval_secs, 60);
        assert_eq!(settings.symbol_pool.len(), 9);
        assert_eq!(settings.symbol_pool[6], "1000PEPEUSDT");
        assert_eq!(settings.max_concurrency, 5);

        assert_eq!(settings.risk.equity_ratio, dec!(0.02));
        assert_eq!(settings.risk.leverage, 30);
        assert_eq!(settings.risk.max_pyramid, 8);
        assert_eq!(settings.risk.max_loss_pct, dec!(0.30));

        assert_eq!(settings.strategy.kline_interval, "15m");
        assert_eq!(settings.strategy.rsi_oversold, 40.0);
        assert!(settings.strategy.breakout_enabled);
        assert_eq!(settings.screener.min_funding_rate, dec!(-0.03));
        assert_eq!(settings.screener.max_candidates, 9);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_map(&vars(&[
            ("BINANCE_API_KEY", "key"),
            ("BINANCE_API_SECRET", "secret"),
            ("TESTNET", "yes"),
            ("SYMBOL_POOL", "btcusdt, ethusdt,,"),
            ("LEVERAGE", "10"),
            ("TRAILING_GIVEBACK_PCT", "0.15"),
            ("PYRAMID_BREAKOUT_ENABLED", "false"),
            ("VOLUME_MIN_USD", "5000000"),
        ]))
        .unwrap();

        let creds = settings.require_credentials().unwrap();
        assert_eq!(creds.api_key, "key");
        assert!(settings.testnet);
        assert_eq!(settings.symbol_pool, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(settings.risk.leverage, 10);
        assert_eq!(settings.risk.trailing_giveback_pct, dec!(0.15));
        assert!(!settings.strategy.breakout_enabled);
        assert_eq!(settings.screener.min_quote_volume, dec!(5000000));
    }

    #[test]
    fn test_primary_key_names_win() {
        let settings = Settings::from_map(&vars(&[
            ("API_KEY", "primary"),
            ("BINANCE_API_KEY", "fallback"),
            ("API_SECRET", "s"),
        ]))
        .unwrap();
        assert_eq!(settings.credentials.unwrap().api_key, "primary");
    }

    #[test]
    fn test_invalid_value_names_key() {
        let err = Settings::from_map(&vars(&[("MAX_LOSS_PCT", "lots")])).unwrap_err();
        assert!(err.to_string().contains("MAX_LOSS_PCT"));

        let err = Settings::from_map(&vars(&[("LEVERAGE", "-3")])).unwrap_err();
        assert!(err.to_string().contains("LEVERAGE"));
    }

    #[test]
    fn test_ema_periods_validated() {
        let err = Settings::from_map(&vars(&[("TREND_EMA_FAST", "30")])).unwrap_err();
        assert!(err.to_string().contains("TREND_EMA_FAST"));
    }
}
