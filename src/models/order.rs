//! Order acknowledgment returned by the exchange.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Accepted order. The risk controller only cares that one exists; the fields
/// are kept for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: String,
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub orig_qty: Decimal,
    #[serde(default)]
    pub executed_qty: Decimal,
}
