//! Signal generation from candles: trend first, then mean reversion, plus a
//! breakout check used to confirm entry-side pyramiding.

mod breakout;
pub mod indicators;
mod revert;
pub mod screener;
mod trend;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::Exchange;
use crate::models::{Candle, Signal};

pub use breakout::BreakoutFilter;
pub use revert::RevertStrategy;
pub use screener::{shortlist, ScreenerConfig};
pub use trend::TrendStrategy;

/// Indicator parameters and candle source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Candle interval, e.g. "15m"
    pub kline_interval: String,

    /// Candles fetched per evaluation
    pub kline_limit: u32,

    pub trend_ema_fast: usize,
    pub trend_ema_slow: usize,
    pub macd_signal: usize,

    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub boll_window: usize,
    pub boll_stddev: f64,

    /// Require a breakout before adding right after an entry
    pub breakout_enabled: bool,
    pub breakout_lookback: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kline_interval: "15m".to_string(),
            kline_limit: 200,
            trend_ema_fast: 12,
            trend_ema_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            rsi_oversold: 40.0,
            rsi_overbought: 60.0,
            boll_window: 20,
            boll_stddev: 2.0,
            breakout_enabled: true,
            breakout_lookback: 20,
        }
    }
}

/// Combines the individual strategies behind the two calls the scanner needs.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: StrategyConfig,
    trend: TrendStrategy,
    revert: RevertStrategy,
    breakout: BreakoutFilter,
}

impl SignalEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            trend: TrendStrategy {
                fast: config.trend_ema_fast,
                slow: config.trend_ema_slow,
                signal: config.macd_signal,
            },
            revert: RevertStrategy {
                rsi_period: config.rsi_period,
                oversold: config.rsi_oversold,
                overbought: config.rsi_overbought,
                boll_window: config.boll_window,
                boll_stddev: config.boll_stddev,
            },
            breakout: BreakoutFilter { lookback: config.breakout_lookback },
            config,
        }
    }

    /// Direction to enter `symbol`, or NONE. Candle fetch failures yield NONE.
    pub async fn signal<E: Exchange + ?Sized>(&self, exchange: &E, symbol: &str) -> Signal {
        let Some(candles) = self.candles(exchange, symbol).await else {
            return Signal::None;
        };
        self.evaluate(&candles)
    }

    /// Pure part of [`signal`](Self::signal).
    pub fn evaluate(&self, candles: &[Candle]) -> Signal {
        let closes = indicators::closes(candles);
        self.trend.evaluate(&closes).or(self.revert.evaluate(&closes))
    }

    /// Whether price has broken out in the position's direction.
    pub async fn should_pyramid<E: Exchange + ?Sized>(&self, exchange: &E, symbol: &str, is_long: bool) -> bool {
        if !self.config.breakout_enabled {
            return false;
        }
        let Some(candles) = self.candles(exchange, symbol).await else {
            return false;
        };
        let confirmed = self.breakout.confirms(&candles, is_long);
        debug!(symbol = %symbol, is_long, confirmed, "Breakout check");
        confirmed
    }

    async fn candles<E: Exchange + ?Sized>(&self, exchange: &E, symbol: &str) -> Option<Vec<Candle>> {
        match exchange
            .klines(symbol, &self.config.kline_interval, self.config.kline_limit)
            .await
        {
            Ok(candles) => Some(candles),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to fetch candles");
                None
            }
        }
    }
}
