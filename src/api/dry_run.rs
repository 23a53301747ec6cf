//! Exchange wrapper that reads through to the real venue but never sends orders.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::models::{Candle, LotSize, OrderAck, PositionSnapshot, Side, Ticker24h};

use super::exchange::{Exchange, ExchangeError};

/// Delegates every read to `inner`; logs and acknowledges order calls locally.
pub struct DryRunExchange<E> {
    inner: E,
}

impl<E: Exchange> DryRunExchange<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    fn simulated_ack(symbol: &str, side: &str, qty: Decimal) -> OrderAck {
        OrderAck {
            order_id: 0,
            client_order_id: format!("dry-{}", uuid::Uuid::new_v4().simple()),
            symbol: symbol.to_string(),
            status: "SIMULATED".to_string(),
            side: side.to_string(),
            orig_qty: qty,
            executed_qty: Decimal::ZERO,
        }
    }
}

#[async_trait]
impl<E: Exchange> Exchange for DryRunExchange<E> {
    async fn get_price(&self, symbol: &str) -> Result<Decimal> {
        self.inner.get_price(symbol).await
    }

    async fn get_equity(&self) -> Result<Decimal> {
        self.inner.get_equity().await
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>> {
        self.inner.get_position(symbol).await
    }

    async fn lot_size(&self, symbol: &str) -> Result<Option<LotSize>> {
        self.inner.lot_size(symbol).await
    }

    async fn open(&self, symbol: &str, side: Side, qty: Decimal) -> Result<OrderAck, ExchangeError> {
        info!(symbol = %symbol, side = %side, qty = %qty, "[DRY RUN] Would open");
        Ok(Self::simulated_ack(symbol, side.order_side(), qty))
    }

    async fn close(&self, symbol: &str) -> Result<Option<OrderAck>, ExchangeError> {
        let position = self
            .inner
            .get_position(symbol)
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        Ok(position.filter(|p| !p.is_flat()).map(|p| {
            let side = if p.position_amount > Decimal::ZERO { "SELL" } else { "BUY" };
            info!(symbol = %symbol, amount = %p.position_amount, "[DRY RUN] Would close");
            Self::simulated_ack(symbol, side, p.position_amount.abs())
        }))
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        info!(symbol = %symbol, leverage, "[DRY RUN] Would set leverage");
        Ok(())
    }

    async fn klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        self.inner.klines(symbol, interval, limit).await
    }

    async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h> {
        self.inner.ticker_24h(symbol).await
    }

    async fn funding_rate(&self, symbol: &str) -> Result<Decimal> {
        self.inner.funding_rate(symbol).await
    }
}
