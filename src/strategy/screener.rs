//! Symbol shortlisting by funding rate and 24h quote volume.

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::Exchange;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Minimum 24h quote volume (USDT)
    pub min_quote_volume: Decimal,

    /// Minimum last funding rate
    pub min_funding_rate: Decimal,

    pub max_candidates: usize,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            min_quote_volume: dec!(3000000),
            min_funding_rate: dec!(-0.03),
            max_candidates: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolMetrics {
    pub symbol: String,
    pub funding_rate: Decimal,
    pub quote_volume: Decimal,
}

/// Fetch metrics for every symbol in `pool` concurrently and pick candidates.
///
/// A metric that cannot be fetched counts as zero, so the symbol is still
/// ranked rather than dropped.
pub async fn shortlist<E: Exchange + ?Sized>(
    exchange: &E,
    pool: &[String],
    config: &ScreenerConfig,
) -> Vec<String> {
    let rows = join_all(pool.iter().map(|symbol| metrics_for(exchange, symbol))).await;
    let picked = select(rows, config);
    info!(pool = pool.len(), candidates = ?picked, "Shortlisted symbols");
    picked
}

async fn metrics_for<E: Exchange + ?Sized>(exchange: &E, symbol: &str) -> SymbolMetrics {
    let funding_rate = exchange.funding_rate(symbol).await.unwrap_or_else(|e| {
        debug!(symbol = %symbol, error = %e, "Funding rate unavailable");
        Decimal::ZERO
    });
    let quote_volume = match exchange.ticker_24h(symbol).await {
        Ok(t) => t.quote_volume,
        Err(e) => {
            debug!(symbol = %symbol, error = %e, "24h stats unavailable");
            Decimal::ZERO
        }
    };

    SymbolMetrics {
        symbol: symbol.to_string(),
        funding_rate,
        quote_volume,
    }
}

/// Symbols passing both thresholds, in pool order. When none pass, the
/// highest-volume symbols instead.
pub fn select(mut rows: Vec<SymbolMetrics>, config: &ScreenerConfig) -> Vec<String> {
    let approved: Vec<String> = rows
        .iter()
        .filter(|r| r.funding_rate >= config.min_funding_rate && r.quote_volume >= config.min_quote_volume)
        .take(config.max_candidates)
        .map(|r| r.symbol.clone())
        .collect();

    if !approved.is_empty() {
        return approved;
    }

    debug!("No symbol passed the screener, falling back to volume ranking");
    // stable sort keeps pool order among equal volumes
    rows.sort_by(|a, b| b.quote_volume.cmp(&a.quote_volume));
    rows.into_iter()
        .take(config.max_candidates)
        .map(|r| r.symbol)
        .collect()
}
