//! Errors surfaced by order placement and trade execution.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::api::ExchangeError;

/// Why the resilient placer gave up.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaceError {
    /// The signal carried no direction; nothing was submitted.
    #[error("invalid side: signal has no direction")]
    InvalidSide,

    /// Halving drove the quantity to zero before retries ran out.
    #[error("quantity too small after resize")]
    QuantityExhausted,

    /// Every allowed submission was rejected for insufficient margin.
    #[error("margin insufficient after {attempts} attempts (last qty {last_qty})")]
    RetriesExhausted { attempts: u32, last_qty: Decimal },

    /// Non-retryable exchange failure.
    #[error("order failed: {0}")]
    Exchange(#[from] ExchangeError),
}

/// Why `execute_trade` / `add_pyramid` did not produce an order.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TradeError {
    #[error("quantity too small")]
    QuantityTooSmall,

    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("pyramid limit reached ({count})")]
    PyramidLimit { count: u32 },

    #[error(transparent)]
    Place(#[from] PlaceError),
}
