//! Exchange access: the `Exchange` seam, the Binance futures client, and a dry-run wrapper.

mod dry_run;
mod exchange;
mod futures_client;
mod types;

#[cfg(test)]
pub mod mock;

pub use dry_run::DryRunExchange;
pub use exchange::{Exchange, ExchangeError};
pub use futures_client::{ApiCredentials, BinanceFuturesClient};
