//! Response types for the Binance USDT-M futures REST API.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::models::{Candle, LotSize, PositionSnapshot, Ticker24h};

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

/// /fapi/v1/ticker/price
#[derive(Debug, Clone, Deserialize)]
pub struct PriceTicker {
    pub price: Decimal,
}

/// /fapi/v2/balance entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub asset: String,
    pub balance: Decimal,
}

/// /fapi/v2/positionRisk entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRiskEntry {
    pub symbol: String,
    #[serde(default)]
    pub entry_price: Decimal,
    #[serde(default)]
    pub position_amt: Decimal,
    #[serde(default, alias = "unrealizedProfit", rename = "unRealizedProfit")]
    pub unrealized_profit: Decimal,
    #[serde(default)]
    pub leverage: Decimal,
}

impl From<PositionRiskEntry> for PositionSnapshot {
    fn from(p: PositionRiskEntry) -> Self {
        Self {
            symbol: p.symbol,
            entry_price: p.entry_price,
            position_amount: p.position_amt,
            unrealized_profit: p.unrealized_profit,
            leverage: p.leverage,
        }
    }
}

/// /fapi/v1/exchangeInfo
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<Value>,
}

impl SymbolInfo {
    /// Extract `LOT_SIZE` / `MIN_NOTIONAL` constraints from the raw filter list.
    pub fn lot_size(&self) -> LotSize {
        let mut lot = LotSize::default();
        for f in &self.filters {
            match f.get("filterType").and_then(Value::as_str) {
                Some("LOT_SIZE") => {
                    lot.step_size = decimal_field(f, "stepSize");
                    lot.min_qty = decimal_field(f, "minQty");
                }
                Some("MIN_NOTIONAL") => {
                    lot.min_notional = f
                        .get("notional")
                        .or_else(|| f.get("minNotional"))
                        .and_then(value_to_decimal)
                        .unwrap_or_default();
                }
                _ => {}
            }
        }
        lot
    }
}

/// /fapi/v1/ticker/24hr
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hResponse {
    pub symbol: String,
    #[serde(default)]
    pub last_price: Decimal,
    #[serde(default)]
    pub quote_volume: Decimal,
}

impl From<Ticker24hResponse> for Ticker24h {
    fn from(t: Ticker24hResponse) -> Self {
        Self {
            symbol: t.symbol,
            last_price: t.last_price,
            quote_volume: t.quote_volume,
        }
    }
}

/// /fapi/v1/premiumIndex
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumIndex {
    #[serde(default)]
    pub last_funding_rate: Decimal,
}

/// Parse one /fapi/v1/klines row: `[openTime, open, high, low, close, volume, ...]`.
pub fn parse_kline(row: &[Value]) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }
    let open_time = Utc.timestamp_millis_opt(row[0].as_i64()?).single()?;
    Some(Candle {
        open_time,
        open: value_to_decimal(&row[1])?,
        high: value_to_decimal(&row[2])?,
        low: value_to_decimal(&row[3])?,
        close: value_to_decimal(&row[4])?,
        volume: value_to_decimal(&row[5])?,
    })
}

fn decimal_field(v: &Value, key: &str) -> Decimal {
    v.get(key).and_then(value_to_decimal).unwrap_or_default()
}

/// Binance encodes decimals as strings; accept plain numbers too.
fn value_to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_position_risk() {
        let body = r#"[{"symbol":"BTCUSDT","positionAmt":"-0.010","entryPrice":"60000.0",
            "markPrice":"59000.0","unRealizedProfit":"10.00000000","leverage":"30"}]"#;
        let rows: Vec<PositionRiskEntry> = serde_json::from_str(body).unwrap();
        let snap: PositionSnapshot = rows.into_iter().next().unwrap().into();
        assert_eq!(snap.position_amount, dec!(-0.010));
        assert_eq!(snap.unrealized_profit, dec!(10));
        assert_eq!(snap.leverage, dec!(30));
    }

    #[test]
    fn test_lot_size_from_filters() {
        let body = r#"{"symbols":[{"symbol":"ETHUSDT","filters":[
            {"filterType":"PRICE_FILTER","tickSize":"0.01"},
            {"filterType":"LOT_SIZE","stepSize":"0.001","minQty":"0.001","maxQty":"10000"},
            {"filterType":"MIN_NOTIONAL","notional":"20"}]}]}"#;
        let info: ExchangeInfo = serde_json::from_str(body).unwrap();
        let lot = info.symbols[0].lot_size();
        assert_eq!(lot.step_size, dec!(0.001));
        assert_eq!(lot.min_qty, dec!(0.001));
        assert_eq!(lot.min_notional, dec!(20));
    }

    #[test]
    fn test_parse_kline_row() {
        let body = r#"[1700000000000,"100.5","101.0","99.5","100.8","1234.5",1700000899999,"0",10,"0","0","0"]"#;
        let row: Vec<Value> = serde_json::from_str(body).unwrap();
        let candle = parse_kline(&row).unwrap();
        assert_eq!(candle.close, dec!(100.8));
        assert_eq!(candle.high, dec!(101.0));
        assert!(parse_kline(&row[..3]).is_none());
    }
}
