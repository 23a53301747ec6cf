//! Market data models: candles, lot filters, and 24h ticker stats.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Quantity constraints from the exchange's `LOT_SIZE` and `MIN_NOTIONAL` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LotSize {
    /// Quantity increment; zero means unconstrained
    pub step_size: Decimal,

    /// Smallest tradable quantity
    pub min_qty: Decimal,

    /// Smallest order value in quote currency (informational)
    #[serde(default)]
    pub min_notional: Decimal,
}

impl LotSize {
    /// Floor `qty` to the step size.
    pub fn floor_to_step(&self, qty: Decimal) -> Decimal {
        if self.step_size.is_zero() {
            return qty;
        }
        (qty / self.step_size).floor() * self.step_size
    }

    /// Floor to step, then zero out anything below the minimum quantity.
    pub fn quantize(&self, qty: Decimal) -> Decimal {
        let q = self.floor_to_step(qty);
        if q < self.min_qty {
            Decimal::ZERO
        } else {
            q
        }
    }
}

/// Rolling 24h statistics for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: Decimal,
    pub quote_volume: Decimal,
}
