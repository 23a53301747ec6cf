//! Risk and sizing configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Thresholds and sizing parameters consumed by the risk controller.
///
/// Ratios are fractions (0.40 = 40%) of the unleveraged notional, matching how
/// the profit ratio is computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fraction of account equity committed per order (before leverage)
    pub equity_ratio: Decimal,

    /// Leverage applied to the notional when sizing, and set on each symbol
    pub leverage: u32,

    /// Maximum number of additional orders per open position
    pub max_pyramid: u32,

    /// Profit ratio at or above which one more order is added
    pub profit_add_threshold_pct: Decimal,

    /// Fraction of the high-water mark that may be given back before exiting
    pub trailing_giveback_pct: Decimal,

    /// Loss ratio at or beyond which the position is closed
    pub max_loss_pct: Decimal,

    /// Extra submissions allowed after a margin-insufficient rejection
    pub order_max_retries: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            equity_ratio: dec!(0.02),              // 2% of equity per order
            leverage: 30,
            max_pyramid: 8,
            profit_add_threshold_pct: dec!(0.40),  // add at +40%
            trailing_giveback_pct: dec!(0.20),     // exit after giving back 20% of peak
            max_loss_pct: dec!(0.30),              // stop at -30%
            order_max_retries: 3,
        }
    }
}
