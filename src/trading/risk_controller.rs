//! Position risk & pyramiding controller.
//!
//! Each monitoring tick runs the same prioritized pipeline over a freshly
//! fetched position snapshot:
//! - stop-loss (close, stop)
//! - profit-triggered pyramid (add, continue)
//! - trailing exit (close)
//!
//! Per-symbol state lives in a [`PositionTracker`] owned by [`RiskController`];
//! during a scan each symbol's state is moved into its own task as a
//! [`RiskSlot`] and moved back after the join.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::api::Exchange;
use crate::models::{OrderAck, Signal};

use super::{
    OrderPlacer, PositionTracker, QuantitySizer, RiskConfig, RiskSlot, SymbolRiskState,
    TradeError,
};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions selected for one tick.
///
/// A stop-loss never comes with a pyramid. A pyramid may be followed by a
/// trailing exit in the same tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleDecision {
    pub exit: Option<ExitReason>,
    pub pyramid: bool,
}

/// What a monitoring tick did for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// No open position; state cleared
    Flat,
    /// Snapshot unusable this tick
    Skipped,
    /// Open, no rule fired
    Held,
    /// Open, one more order placed
    Pyramided,
    Closed(ExitReason),
    /// A close was attempted and failed; state kept for the next tick
    Failed,
}

/// Apply the ordered rule set to a profit ratio and the symbol's state.
///
/// The high-water mark used is `max(state.high_water_ratio, profit_ratio)`, so
/// the result is the same whether or not the caller already folded the
/// current ratio into the state.
pub fn evaluate_rules(
    config: &RiskConfig,
    profit_ratio: Decimal,
    state: &SymbolRiskState,
) -> RuleDecision {
    if profit_ratio <= -config.max_loss_pct {
        return RuleDecision {
            exit: Some(ExitReason::StopLoss),
            pyramid: false,
        };
    }

    let pyramid = profit_ratio >= config.profit_add_threshold_pct
        && state.pyramid_count < config.max_pyramid;

    let high_water = state.high_water_ratio.max(profit_ratio);
    let trailing = high_water > Decimal::ZERO
        && (high_water - profit_ratio) >= high_water * config.trailing_giveback_pct;

    RuleDecision {
        exit: trailing.then_some(ExitReason::TrailingStop),
        pyramid,
    }
}

/// Sizing, placement and per-symbol monitoring against one exchange.
///
/// Stateless apart from configuration; symbol state is always passed in as a
/// [`RiskSlot`].
pub struct TradeExecutor<E: ?Sized> {
    exchange: Arc<E>,
    config: RiskConfig,
    sizer: QuantitySizer,
    placer: OrderPlacer,
}

impl<E: Exchange + ?Sized> TradeExecutor<E> {
    pub fn new(exchange: Arc<E>, config: RiskConfig) -> Self {
        Self {
            sizer: QuantitySizer::from_config(&config),
            placer: OrderPlacer::new(config.order_max_retries),
            exchange,
            config,
        }
    }

    pub fn exchange(&self) -> &Arc<E> {
        &self.exchange
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Size and place one order in the direction of `signal`.
    pub async fn execute_trade(&self, symbol: &str, signal: Signal) -> Result<OrderAck, TradeError> {
        let price = self
            .exchange
            .get_price(symbol)
            .await
            .map_err(|e| TradeError::DataUnavailable(format!("price: {:#}", e)))?;
        let equity = self
            .exchange
            .get_equity()
            .await
            .map_err(|e| TradeError::DataUnavailable(format!("equity: {:#}", e)))?;
        let lot = self
            .exchange
            .lot_size(symbol)
            .await
            .map_err(|e| TradeError::DataUnavailable(format!("lot size: {:#}", e)))?;

        let qty = self.sizer.size(symbol, equity, price, lot.as_ref());
        if qty.is_zero() {
            warn!(
                symbol = %symbol,
                action = "open",
                reason = "quantity too small",
                equity = %equity,
                price = %price,
                "Skipping order"
            );
            return Err(TradeError::QuantityTooSmall);
        }

        info!(
            symbol = %symbol,
            action = "open",
            signal = %signal,
            qty = %qty,
            price = %price,
            "Placing order"
        );

        Ok(self.placer.place(self.exchange.as_ref(), symbol, signal, qty).await?)
    }

    /// Add one order to the position held in `slot`, unless it is at the
    /// pyramid ceiling. The count only moves on success.
    pub async fn add_pyramid(&self, signal: Signal, slot: &mut RiskSlot) -> Result<OrderAck, TradeError> {
        let count = slot.pyramid_count();
        if count >= self.config.max_pyramid {
            info!(
                symbol = %slot.symbol(),
                action = "pyramid",
                reason = "limit reached",
                pyramid_count = count,
                "Not adding to position"
            );
            return Err(TradeError::PyramidLimit { count });
        }

        let ack = self.execute_trade(slot.symbol(), signal).await?;
        slot.increment_pyramid();

        info!(
            symbol = %slot.symbol(),
            action = "pyramid",
            signal = %signal,
            pyramid_count = slot.pyramid_count(),
            order_id = ack.order_id,
            "Added to position"
        );
        Ok(ack)
    }

    /// One monitoring tick for the slot's symbol.
    pub async fn monitor(&self, slot: &mut RiskSlot) -> MonitorOutcome {
        let symbol = slot.symbol().to_string();

        let position = match self.exchange.get_position(&symbol).await {
            Ok(p) => p,
            Err(e) => {
                warn!(symbol = %symbol, reason = "data unavailable", error = %e, "Position unavailable, skipping");
                return MonitorOutcome::Skipped;
            }
        };

        let Some(position) = position.filter(|p| !p.is_flat()) else {
            if slot.state().is_some() {
                info!(symbol = %symbol, action = "clear", reason = "flat", "Position gone, clearing state");
            }
            slot.clear();
            return MonitorOutcome::Flat;
        };

        let (Some(profit_ratio), Some(side)) = (position.profit_ratio(), position.side()) else {
            debug!(
                symbol = %symbol,
                entry_price = %position.entry_price,
                amount = %position.position_amount,
                "Insufficient data for profit ratio"
            );
            return MonitorOutcome::Skipped;
        };

        slot.update_high_water(profit_ratio);
        let state = slot.get_or_init();
        let decision = evaluate_rules(&self.config, profit_ratio, &state);

        debug!(
            symbol = %symbol,
            side = %side,
            profit_ratio = %profit_ratio,
            high_water = %state.high_water_ratio,
            pyramid_count = state.pyramid_count,
            ?decision,
            "Evaluated position"
        );

        if decision.exit == Some(ExitReason::StopLoss) {
            return self.close(slot, ExitReason::StopLoss, profit_ratio).await;
        }

        let mut outcome = MonitorOutcome::Held;
        if decision.pyramid {
            info!(
                symbol = %symbol,
                action = "pyramid",
                reason = "profit threshold",
                profit_ratio = %profit_ratio,
                "Profit threshold reached"
            );
            match self.add_pyramid(Signal::from(side), slot).await {
                Ok(_) => outcome = MonitorOutcome::Pyramided,
                Err(e) => warn!(symbol = %symbol, action = "pyramid", error = %e, "Pyramid order failed"),
            }
        }

        if let Some(reason) = decision.exit {
            return self.close(slot, reason, profit_ratio).await;
        }

        outcome
    }

    async fn close(&self, slot: &mut RiskSlot, reason: ExitReason, profit_ratio: Decimal) -> MonitorOutcome {
        let high_water = slot.state().map(|s| s.high_water_ratio).unwrap_or_default();

        match self.exchange.close(slot.symbol()).await {
            Ok(ack) => {
                info!(
                    symbol = %slot.symbol(),
                    action = "close",
                    reason = %reason,
                    profit_ratio = %profit_ratio,
                    high_water = %high_water,
                    order_id = ack.as_ref().map(|a| a.order_id),
                    "Position closed"
                );
                slot.clear();
                MonitorOutcome::Closed(reason)
            }
            Err(e) => {
                error!(
                    symbol = %slot.symbol(),
                    action = "close",
                    reason = %reason,
                    profit_ratio = %profit_ratio,
                    error = %e,
                    "Close failed"
                );
                MonitorOutcome::Failed
            }
        }
    }
}

/// Owns the tracker and fans per-symbol work out to tokio tasks.
pub struct RiskController<E: ?Sized> {
    executor: Arc<TradeExecutor<E>>,
    tracker: PositionTracker,
}

impl<E: Exchange + ?Sized + 'static> RiskController<E> {
    pub fn new(exchange: Arc<E>, config: RiskConfig) -> Self {
        let tracker = PositionTracker::new(config.max_pyramid);
        Self {
            executor: Arc::new(TradeExecutor::new(exchange, config)),
            tracker,
        }
    }

    pub fn executor(&self) -> &Arc<TradeExecutor<E>> {
        &self.executor
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    /// Run `task` once per distinct symbol, concurrently.
    ///
    /// Each task owns its symbol's slot and hands it back with its result.
    /// A task that panics loses its slot (state cleared) and contributes no
    /// result; the others are unaffected.
    pub async fn fan_out<F, Fut, T>(&mut self, symbols: &[String], task: F) -> Vec<(String, T)>
    where
        F: Fn(Arc<TradeExecutor<E>>, RiskSlot) -> Fut,
        Fut: Future<Output = (RiskSlot, T)> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = self
            .tracker
            .checkout(symbols)
            .into_iter()
            .map(|slot| {
                let symbol = slot.symbol().to_string();
                (symbol, tokio::spawn(task(self.executor.clone(), slot)))
            })
            .collect();

        let joined = join_all(
            handles
                .into_iter()
                .map(|(symbol, handle)| async move { (symbol, handle.await) }),
        )
        .await;

        let mut slots = Vec::with_capacity(joined.len());
        let mut results = Vec::with_capacity(joined.len());
        for (symbol, result) in joined {
            match result {
                Ok((slot, value)) => {
                    slots.push(slot);
                    results.push((symbol, value));
                }
                Err(e) => error!(symbol = %symbol, error = %e, "Symbol task failed"),
            }
        }
        self.tracker.checkin(slots);
        results
    }

    /// One monitoring tick for every symbol, concurrently.
    pub async fn monitor_all(&mut self, symbols: &[String]) -> Vec<(String, MonitorOutcome)> {
        let outcomes = self
            .fan_out(symbols, |executor, mut slot| async move {
                let outcome = executor.monitor(&mut slot).await;
                (slot, outcome)
            })
            .await;

        let closed = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, MonitorOutcome::Closed(_)))
            .count();
        debug!(symbols = symbols.len(), closed, tracked = self.tracker.len(), "Monitoring pass complete");
        outcomes
    }
}
