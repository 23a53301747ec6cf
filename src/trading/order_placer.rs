//! Order submission with halve-and-retry on insufficient margin.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info, warn};

use crate::api::Exchange;
use crate::models::{OrderAck, Side, Signal};

use super::PlaceError;

const DEFAULT_MAX_RETRIES: u32 = 3;

const RESIZE_FACTOR: Decimal = dec!(0.5);
const RESIZE_DP: u32 = 8;

/// Submits market orders, halving the quantity each time margin runs short.
#[derive(Debug, Clone, Copy)]
pub struct OrderPlacer {
    max_retries: u32,
}

impl Default for OrderPlacer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl OrderPlacer {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Place `quantity` in the direction of `signal`.
    ///
    /// Submits at most `max_retries + 1` times. Only
    /// [`ExchangeError::InsufficientMargin`](crate::api::ExchangeError) is
    /// retried; everything else ends the attempt immediately.
    pub async fn place<E: Exchange + ?Sized>(
        &self,
        exchange: &E,
        symbol: &str,
        signal: Signal,
        quantity: Decimal,
    ) -> Result<OrderAck, PlaceError> {
        let side = Side::try_from(signal).map_err(|s| {
            error!(symbol = %symbol, signal = %s, "Unknown side, not placing order");
            PlaceError::InvalidSide
        })?;

        let attempts = self.max_retries + 1;
        let mut qty = quantity;
        let mut attempt = 1;

        loop {
            match exchange.open(symbol, side, qty).await {
                Ok(ack) => {
                    info!(
                        symbol = %symbol,
                        side = %side,
                        qty = %qty,
                        attempt,
                        order_id = ack.order_id,
                        "Order accepted"
                    );
                    return Ok(ack);
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= attempts {
                        warn!(symbol = %symbol, attempts, qty = %qty, "Margin insufficient, retries exhausted");
                        return Err(PlaceError::RetriesExhausted { attempts, last_qty: qty });
                    }

                    let next = (qty * RESIZE_FACTOR).round_dp(RESIZE_DP);
                    if next <= Decimal::ZERO {
                        warn!(symbol = %symbol, qty = %qty, "Quantity too small after resize");
                        return Err(PlaceError::QuantityExhausted);
                    }

                    warn!(
                        symbol = %symbol,
                        attempt,
                        qty = %next,
                        "Margin insufficient, retrying with smaller quantity"
                    );
                    qty = next;
                    attempt += 1;
                }
                Err(e) => {
                    error!(symbol = %symbol, side = %side, qty = %qty, error = %e, "Order failed");
                    return Err(e.into());
                }
            }
        }
    }
}
