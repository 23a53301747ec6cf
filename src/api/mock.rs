//! In-memory exchange for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{Candle, LotSize, OrderAck, PositionSnapshot, Side, Ticker24h};

use super::exchange::{Exchange, ExchangeError};

#[derive(Default)]
struct State {
    prices: HashMap<String, Decimal>,
    equity: Decimal,
    positions: HashMap<String, PositionSnapshot>,
    lots: HashMap<String, LotSize>,
    candles: HashMap<String, Vec<Candle>>,
    tickers: HashMap<String, Decimal>,
    funding: HashMap<String, Decimal>,
    failing_reads: HashSet<String>,
    open_results: VecDeque<Result<(), ExchangeError>>,
    close_results: VecDeque<Result<(), ExchangeError>>,
    opened: Vec<(String, Side, Decimal)>,
    closes: HashMap<String, usize>,
    leverage: HashMap<String, u32>,
    next_order_id: i64,
}

/// Scriptable exchange: set prices/positions, queue order outcomes, inspect calls.
#[derive(Default)]
pub struct MockExchange {
    state: Mutex<State>,
}

impl MockExchange {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.set_equity(dec!(10000));
        mock
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.with(|s| s.prices.insert(symbol.to_string(), price));
    }

    pub fn set_equity(&self, equity: Decimal) {
        self.with(|s| s.equity = equity);
    }

    pub fn set_lot(&self, symbol: &str, step_size: Decimal, min_qty: Decimal) {
        self.with(|s| {
            s.lots.insert(
                symbol.to_string(),
                LotSize { step_size, min_qty, min_notional: Decimal::ZERO },
            )
        });
    }

    pub fn set_position(&self, symbol: &str, amount: Decimal, entry: Decimal, upnl: Decimal) {
        self.with(|s| {
            s.positions.insert(
                symbol.to_string(),
                PositionSnapshot {
                    symbol: symbol.to_string(),
                    entry_price: entry,
                    position_amount: amount,
                    unrealized_profit: upnl,
                    leverage: dec!(30),
                },
            )
        });
    }

    pub fn remove_position(&self, symbol: &str) {
        self.with(|s| s.positions.remove(symbol));
    }

    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.with(|s| s.candles.insert(symbol.to_string(), candles));
    }

    pub fn set_market_stats(&self, symbol: &str, quote_volume: Decimal, funding: Decimal) {
        self.with(|s| {
            s.tickers.insert(symbol.to_string(), quote_volume);
            s.funding.insert(symbol.to_string(), funding);
        });
    }

    /// Every read for `symbol` fails from now on.
    pub fn fail_reads_for(&self, symbol: &str) {
        self.with(|s| s.failing_reads.insert(symbol.to_string()));
    }

    /// Queue the outcome of the next `open` call. Unqueued calls succeed.
    pub fn push_open_result(&self, result: Result<(), ExchangeError>) {
        self.with(|s| s.open_results.push_back(result));
    }

    pub fn push_close_result(&self, result: Result<(), ExchangeError>) {
        self.with(|s| s.close_results.push_back(result));
    }

    /// Every `open` attempt, successful or not.
    pub fn opened(&self) -> Vec<(String, Side, Decimal)> {
        self.with(|s| s.opened.clone())
    }

    pub fn close_count(&self, symbol: &str) -> usize {
        self.with(|s| s.closes.get(symbol).copied().unwrap_or(0))
    }

    pub fn leverage_for(&self, symbol: &str) -> Option<u32> {
        self.with(|s| s.leverage.get(symbol).copied())
    }

    fn check_read(&self, symbol: &str) -> Result<()> {
        if self.with(|s| s.failing_reads.contains(symbol)) {
            return Err(anyhow!("simulated read failure for {}", symbol));
        }
        Ok(())
    }

    fn ack(s: &mut State, symbol: &str, side: &str, qty: Decimal) -> OrderAck {
        s.next_order_id += 1;
        OrderAck {
            order_id: s.next_order_id,
            client_order_id: format!("mock-{}", s.next_order_id),
            symbol: symbol.to_string(),
            status: "FILLED".to_string(),
            side: side.to_string(),
            orig_qty: qty,
            executed_qty: qty,
        }
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn get_price(&self, symbol: &str) -> Result<Decimal> {
        self.check_read(symbol)?;
        self.with(|s| s.prices.get(symbol).copied())
            .ok_or_else(|| anyhow!("no price for {}", symbol))
    }

    async fn get_equity(&self) -> Result<Decimal> {
        Ok(self.with(|s| s.equity))
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>> {
        self.check_read(symbol)?;
        Ok(self.with(|s| s.positions.get(symbol).cloned()))
    }

    async fn lot_size(&self, symbol: &str) -> Result<Option<LotSize>> {
        Ok(self.with(|s| s.lots.get(symbol).copied()))
    }

    async fn open(&self, symbol: &str, side: Side, qty: Decimal) -> Result<OrderAck, ExchangeError> {
        self.with(|s| {
            s.opened.push((symbol.to_string(), side, qty));
            match s.open_results.pop_front() {
                Some(Err(e)) => Err(e),
                _ => Ok(Self::ack(s, symbol, side.order_side(), qty)),
            }
        })
    }

    async fn close(&self, symbol: &str) -> Result<Option<OrderAck>, ExchangeError> {
        self.with(|s| {
            *s.closes.entry(symbol.to_string()).or_insert(0) += 1;
            if let Some(Err(e)) = s.close_results.pop_front() {
                return Err(e);
            }
            match s.positions.remove(symbol) {
                Some(p) if !p.is_flat() => {
                    let side = if p.position_amount > Decimal::ZERO { "SELL" } else { "BUY" };
                    Ok(Some(Self::ack(s, symbol, side, p.position_amount.abs())))
                }
                _ => Ok(None),
            }
        })
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        self.check_read(symbol)?;
        self.with(|s| s.leverage.insert(symbol.to_string(), leverage));
        Ok(())
    }

    async fn klines(&self, symbol: &str, _interval: &str, limit: u32) -> Result<Vec<Candle>> {
        self.check_read(symbol)?;
        let candles = self.with(|s| s.candles.get(symbol).cloned().unwrap_or_default());
        let skip = candles.len().saturating_sub(limit as usize);
        Ok(candles.into_iter().skip(skip).collect())
    }

    async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h> {
        self.check_read(symbol)?;
        let quote_volume = self.with(|s| s.tickers.get(symbol).copied().unwrap_or_default());
        Ok(Ticker24h {
            symbol: symbol.to_string(),
            last_price: self.with(|s| s.prices.get(symbol).copied().unwrap_or_default()),
            quote_volume,
        })
    }

    async fn funding_rate(&self, symbol: &str) -> Result<Decimal> {
        self.check_read(symbol)?;
        Ok(self.with(|s| s.funding.get(symbol).copied().unwrap_or_default()))
    }
}

/// Build candles from a close series; high/low straddle the close by 0.5.
pub fn candles_from_closes(closes: &[Decimal]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};

    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            open_time: start + Duration::minutes(15 * i as i64),
            open: close,
            high: close + dec!(0.5),
            low: close - dec!(0.5),
            close,
            volume: dec!(1000),
        })
        .collect()
}
