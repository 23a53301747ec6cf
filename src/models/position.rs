//! Position snapshot as reported by the exchange for a single symbol.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// Read-only view of one symbol's futures position, fetched fresh every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Exchange symbol (e.g. "BTCUSDT")
    pub symbol: String,

    /// Average entry price
    pub entry_price: Decimal,

    /// Signed position amount (positive = long, negative = short, zero = flat)
    pub position_amount: Decimal,

    /// Unrealized P&L in quote currency
    pub unrealized_profit: Decimal,

    /// Leverage applied to the position (informational)
    #[serde(default)]
    pub leverage: Decimal,
}

impl PositionSnapshot {
    /// Whether there is nothing open for this symbol.
    pub fn is_flat(&self) -> bool {
        self.position_amount.is_zero()
    }

    /// Direction of the open position, `None` when flat.
    pub fn side(&self) -> Option<Side> {
        if self.position_amount > Decimal::ZERO {
            Some(Side::Long)
        } else if self.position_amount < Decimal::ZERO {
            Some(Side::Short)
        } else {
            None
        }
    }

    /// Unleveraged exposure: |amount| * entry price.
    pub fn notional(&self) -> Decimal {
        self.position_amount.abs() * self.entry_price
    }

    /// Unrealized profit over notional, without any leverage adjustment.
    ///
    /// Returns `None` when the entry price is zero or the notional is not
    /// positive, i.e. when the snapshot cannot support a ratio.
    pub fn profit_ratio(&self) -> Option<Decimal> {
        if self.entry_price.is_zero() {
            return None;
        }
        let notional = self.notional();
        if notional <= Decimal::ZERO {
            return None;
        }
        Some(self.unrealized_profit / notional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(amount: Decimal, entry: Decimal, upnl: Decimal) -> PositionSnapshot {
        PositionSnapshot {
            symbol: "BTCUSDT".to_string(),
            entry_price: entry,
            position_amount: amount,
            unrealized_profit: upnl,
            leverage: dec!(30),
        }
    }

    #[test]
    fn test_profit_ratio_long() {
        let pos = snapshot(dec!(2), dec!(100), dec!(24));
        assert_eq!(pos.notional(), dec!(200));
        assert_eq!(pos.profit_ratio(), Some(dec!(0.12)));
        assert_eq!(pos.side(), Some(Side::Long));
    }

    #[test]
    fn test_profit_ratio_short_uses_absolute_amount() {
        let pos = snapshot(dec!(-4), dec!(50), dec!(-20));
        assert_eq!(pos.notional(), dec!(200));
        assert_eq!(pos.profit_ratio(), Some(dec!(-0.1)));
        assert_eq!(pos.side(), Some(Side::Short));
    }

    #[test]
    fn test_profit_ratio_unavailable() {
        assert_eq!(snapshot(dec!(1), dec!(0), dec!(5)).profit_ratio(), None);
        assert_eq!(snapshot(dec!(0), dec!(100), dec!(0)).profit_ratio(), None);
        assert!(snapshot(dec!(0), dec!(100), dec!(0)).is_flat());
    }
}
