//! Exchange seam used by the risk controller, strategies, and screener.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{Candle, LotSize, OrderAck, PositionSnapshot, Side, Ticker24h};

/// Binance error code for "Margin is insufficient."
const MARGIN_INSUFFICIENT_CODE: i64 = -2019;

/// Classified order submission failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExchangeError {
    /// Not enough margin for the requested quantity; retrying smaller may work.
    #[error("margin insufficient ({code}): {message}")]
    InsufficientMargin { code: i64, message: String },

    /// The exchange refused the order for any other reason.
    #[error("order rejected ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// The request never produced an exchange verdict.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ExchangeError {
    /// Classify an exchange error code and message.
    pub fn from_code(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == MARGIN_INSUFFICIENT_CODE || message.contains("Margin is insufficient") {
            Self::InsufficientMargin { code, message }
        } else {
            Self::Rejected { code, message }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InsufficientMargin { .. })
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Everything the bot needs from a futures venue.
///
/// Reads return `anyhow::Result`; callers treat a failed read as missing
/// data for the current tick. Order calls return a classified
/// [`ExchangeError`] so retry decisions never depend on message parsing.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Latest traded price.
    async fn get_price(&self, symbol: &str) -> Result<Decimal>;

    /// Wallet balance of the margin asset.
    async fn get_equity(&self) -> Result<Decimal>;

    /// Current position, `None` when the exchange reports no row for the symbol.
    async fn get_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>>;

    /// Lot constraints, `None` when the symbol is unknown to exchange info.
    async fn lot_size(&self, symbol: &str) -> Result<Option<LotSize>>;

    /// Market order opening or adding to `side`.
    async fn open(&self, symbol: &str, side: Side, qty: Decimal) -> Result<OrderAck, ExchangeError>;

    /// Reduce-only market order for the full position. `Ok(None)` when flat;
    /// a position too small to close is a rejection.
    async fn close(&self, symbol: &str) -> Result<Option<OrderAck>, ExchangeError>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()>;

    async fn klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>>;

    async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h>;

    /// Last funding rate from the premium index.
    async fn funding_rate(&self, symbol: &str) -> Result<Decimal>;
}
