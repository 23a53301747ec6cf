//! Binance USDT-M futures REST client.
//!
//! Handles:
//! - HMAC-SHA256 request signing for account and order endpoints
//! - Exchange-info lot filters, cached per symbol for the life of the process
//! - Market order placement with classified rejections
//! - Backoff retries for public reads (never for order submission)

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::Sha256;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

use crate::models::{Candle, LotSize, OrderAck, PositionSnapshot, Side, Ticker24h};

use super::exchange::{Exchange, ExchangeError};
use super::types::*;

pub const MAINNET_URL: &str = "https://fapi.binance.com";
pub const TESTNET_URL: &str = "https://testnet.binancefuture.com";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const RECV_WINDOW_MS: u64 = 5000;
const MARGIN_ASSET: &str = "USDT";

/// API key pair for signed endpoints.
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &format!("{}...", self.api_key.chars().take(4).collect::<String>()))
            .finish()
    }
}

/// Client for the Binance USDT-M futures API.
pub struct BinanceFuturesClient {
    http: Client,
    base_url: String,
    credentials: ApiCredentials,
    permits: Semaphore,
    /// `None` marks a symbol exchange info does not list
    lot_cache: RwLock<HashMap<String, Option<LotSize>>>,
}

impl BinanceFuturesClient {
    /// Create a client against mainnet or the futures testnet.
    pub fn new(credentials: ApiCredentials, testnet: bool, max_concurrency: usize) -> Result<Self> {
        let base_url = if testnet { TESTNET_URL } else { MAINNET_URL };
        Self::with_base_url(credentials, base_url.to_string(), max_concurrency)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        credentials: ApiCredentials,
        base_url: String,
        max_concurrency: usize,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url,
            credentials,
            permits: Semaphore::new(max_concurrency.max(1)),
            lot_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Public GET with exponential backoff on transport errors and 5xx.
    async fn public_get<T: DeserializeOwned + Send>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(250))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(Some(Duration::from_secs(6)))
            .build();

        let url = url.as_str();
        backoff::future::retry(policy, || async move {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| backoff::Error::permanent(anyhow!(e)))?;

            debug!(url = %url, "GET");
            let response = self
                .http
                .get(url)
                .query(params)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(anyhow!("request to {} failed: {}", url, e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let err = anyhow!("{} failed: {} - {}", url, status, body);
                return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                });
            }

            response
                .json::<T>()
                .await
                .map_err(|e| backoff::Error::permanent(anyhow!("failed to parse {}: {}", url, e)))
        })
        .await
    }

    /// Signed request. Non-2xx responses are classified from the error body.
    async fn signed<T: DeserializeOwned + Send>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, ExchangeError> {
        // timestamp must be taken after any wait for a permit
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        params.push(("recvWindow", RECV_WINDOW_MS.to_string()));
        params.push(("timestamp", chrono::Utc::now().timestamp_millis().to_string()));

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let signature = sign(&self.credentials.api_secret, &query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);

        debug!(method = %method, path = %path, "signed request");
        let response = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.credentials.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => ExchangeError::from_code(err.code, err.msg),
                Err(_) if status.is_server_error() => {
                    ExchangeError::Transport(format!("{} - {}", status, body))
                }
                Err(_) => ExchangeError::from_code(-i64::from(status.as_u16()), body),
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Load and cache the lot filters for every listed symbol. `symbol` is
    /// cached as unknown when the listing does not contain it.
    async fn refresh_exchange_info(&self, symbol: &str) -> Result<Option<LotSize>> {
        let info: ExchangeInfo = self.public_get("/fapi/v1/exchangeInfo", &[]).await?;
        let mut cache = self.lot_cache.write().await;
        for s in &info.symbols {
            cache.insert(s.symbol.clone(), Some(s.lot_size()));
        }
        let lot = *cache.entry(symbol.to_string()).or_insert_with(|| {
            warn!(symbol = %symbol, "Symbol not listed in exchange info");
            None
        });
        debug!(symbols = cache.len(), "Exchange info cached");
        Ok(lot)
    }

    async fn quantize(&self, symbol: &str, qty: Decimal) -> Result<Decimal> {
        Ok(match self.lot_size(symbol).await? {
            Some(lot) => lot.quantize(qty),
            None => qty,
        })
    }

    async fn market_order(
        &self,
        symbol: &str,
        order_side: &str,
        qty: Decimal,
        reduce_only: bool,
    ) -> Result<OrderAck, ExchangeError> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("side", order_side.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", qty.normalize().to_string()),
            ("newClientOrderId", uuid::Uuid::new_v4().simple().to_string()),
        ];
        if reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }
        self.signed(Method::POST, "/fapi/v1/order", params).await
    }
}

#[async_trait]
impl Exchange for BinanceFuturesClient {
    async fn get_price(&self, symbol: &str) -> Result<Decimal> {
        let ticker: PriceTicker = self
            .public_get("/fapi/v1/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        Ok(ticker.price)
    }

    async fn get_equity(&self) -> Result<Decimal> {
        let balances: Vec<BalanceEntry> = self
            .signed(Method::GET, "/fapi/v2/balance", vec![])
            .await
            .context("Failed to fetch balance")?;

        Ok(balances
            .into_iter()
            .find(|b| b.asset == MARGIN_ASSET)
            .map(|b| b.balance)
            .unwrap_or(Decimal::ZERO))
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>> {
        let rows: Vec<PositionRiskEntry> = self
            .signed(Method::GET, "/fapi/v2/positionRisk", vec![("symbol", symbol.to_string())])
            .await
            .context("Failed to fetch position risk")?;

        Ok(rows
            .into_iter()
            .find(|p| p.symbol == symbol)
            .map(PositionSnapshot::from))
    }

    async fn lot_size(&self, symbol: &str) -> Result<Option<LotSize>> {
        if let Some(lot) = self.lot_cache.read().await.get(symbol) {
            return Ok(*lot);
        }
        self.refresh_exchange_info(symbol).await
    }

    async fn open(&self, symbol: &str, side: Side, qty: Decimal) -> Result<OrderAck, ExchangeError> {
        let q = self
            .quantize(symbol, qty)
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        if q <= Decimal::ZERO {
            return Err(ExchangeError::Rejected {
                code: 0,
                message: format!("quantity {} below lot minimum", qty),
            });
        }
        self.market_order(symbol, side.order_side(), q, false).await
    }

    async fn close(&self, symbol: &str) -> Result<Option<OrderAck>, ExchangeError> {
        let position = self
            .get_position(symbol)
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let Some(pos) = position.filter(|p| !p.is_flat()) else {
            return Ok(None);
        };

        let order_side = if pos.position_amount > Decimal::ZERO { "SELL" } else { "BUY" };
        let qty = self
            .quantize(symbol, pos.position_amount.abs())
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        if qty <= Decimal::ZERO {
            warn!(symbol = %symbol, amount = %pos.position_amount, "Position below lot minimum, cannot close");
            return Err(ExchangeError::Rejected {
                code: 0,
                message: format!("position {} below lot minimum", pos.position_amount),
            });
        }

        self.market_order(symbol, order_side, qty, true).await.map(Some)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        let _: Value = self
            .signed(
                Method::POST,
                "/fapi/v1/leverage",
                vec![("symbol", symbol.to_string()), ("leverage", leverage.to_string())],
            )
            .await
            .with_context(|| format!("Failed to set leverage for {}", symbol))?;
        Ok(())
    }

    async fn klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let rows: Vec<Vec<Value>> = self
            .public_get(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.min(1500).to_string()),
                ],
            )
            .await?;

        Ok(rows.iter().filter_map(|r| parse_kline(r)).collect())
    }

    async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h> {
        let t: Ticker24hResponse = self
            .public_get("/fapi/v1/ticker/24hr", &[("symbol", symbol.to_string())])
            .await?;
        Ok(t.into())
    }

    async fn funding_rate(&self, symbol: &str) -> Result<Decimal> {
        let p: PremiumIndex = self
            .public_get("/fapi/v1/premiumIndex", &[("symbol", symbol.to_string())])
            .await?;
        Ok(p.last_funding_rate)
    }
}

/// HMAC-SHA256 of `payload` keyed by `secret`, hex encoded.
pub fn sign(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Transport(format!("invalid signing key: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
