//! Trading core: sizing, resilient order placement, per-symbol risk state and
//! the risk controller that ties them together.

mod config;
mod error;
mod order_placer;
mod position_tracker;
mod quantity_sizer;
mod risk_controller;

pub use config::RiskConfig;
pub use error::{PlaceError, TradeError};
pub use order_placer::OrderPlacer;
pub use position_tracker::{PositionTracker, RiskSlot, SymbolRiskState};
pub use quantity_sizer::QuantitySizer;
pub use risk_controller::{MonitorOutcome, RiskController, TradeExecutor};
