//! Data models for positions, signals, orders, and market data.

mod market;
mod order;
mod position;
mod signal;

pub use market::{Candle, LotSize, Ticker24h};
pub use order::OrderAck;
pub use position::PositionSnapshot;
pub use signal::{Side, Signal};
