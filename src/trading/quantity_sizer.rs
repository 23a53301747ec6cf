//! Order quantity sizing from equity, leverage, and price.

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::LotSize;

use super::RiskConfig;

/// Converts equity into an exchange-conformant order quantity.
#[derive(Debug, Clone, Copy)]
pub struct QuantitySizer {
    equity_ratio: Decimal,
    leverage: Decimal,
}

impl QuantitySizer {
    pub fn new(equity_ratio: Decimal, leverage: u32) -> Self {
        Self {
            equity_ratio,
            leverage: Decimal::from(leverage),
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.equity_ratio, config.leverage)
    }

    /// Quantity for one order on `symbol`.
    ///
    /// `notional = equity * equity_ratio`, `raw = notional * leverage / price`,
    /// floored to the lot step and zeroed below the lot minimum. Without a lot
    /// filter the raw quantity is returned as is. Non-positive equity or price
    /// yields zero, which callers treat as "skip".
    pub fn size(&self, symbol: &str, equity: Decimal, price: Decimal, lot: Option<&LotSize>) -> Decimal {
        if equity <= Decimal::ZERO || price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let notional = equity * self.equity_ratio;
        let raw_qty = notional * self.leverage / price;
        let qty = match lot {
            Some(lot) => lot.quantize(raw_qty),
            None => raw_qty,
        };

        debug!(
            symbol = %symbol,
            equity = %equity,
            price = %price,
            notional = %notional,
            raw_qty = %raw_qty,
            qty = %qty,
            "Sized order"
        );
        qty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lot(step: Decimal, min: Decimal) -> LotSize {
        LotSize { step_size: step, min_qty: min, min_notional: Decimal::ZERO }
    }

    #[test]
    fn test_reference_sizing() {
        let sizer = QuantitySizer::new(dec!(0.02), 30);

        // notional 200, raw 60
        let unconstrained = sizer.size("S", dec!(10000), dec!(100), None);
        assert_eq!(unconstrained, dec!(60));

        let stepped = sizer.size("S", dec!(10000), dec!(100), Some(&lot(dec!(0.001), dec!(0.001))));
        assert_eq!(stepped, dec!(60));

        let coarse = sizer.size("S", dec!(10000), dec!(100), Some(&lot(dec!(7), dec!(1))));
        assert_eq!(coarse, dec!(56));
    }

    #[test]
    fn test_below_minimum_is_zero() {
        let sizer = QuantitySizer::new(dec!(0.02), 30);
        // raw = 200 * 30 / 60000 = 0.1
        let qty = sizer.size("BTCUSDT", dec!(10000), dec!(60000), Some(&lot(dec!(0.001), dec!(0.5))));
        assert_eq!(qty, Decimal::ZERO);
    }

    #[test]
    fn test_non_positive_inputs() {
        let sizer = QuantitySizer::from_config(&RiskConfig::default());
        assert_eq!(sizer.size("S", Decimal::ZERO, dec!(100), None), Decimal::ZERO);
        assert_eq!(sizer.size("S", dec!(10000), Decimal::ZERO, None), Decimal::ZERO);
        assert_eq!(sizer.size("S", dec!(-5), dec!(100), None), Decimal::ZERO);
    }

    #[test]
    fn test_deterministic() {
        let sizer = QuantitySizer::new(dec!(0.02), 30);
        let l = lot(dec!(0.01), dec!(0.01));
        let a = sizer.size("ETHUSDT", dec!(1234.56), dec!(3210.5), Some(&l));
        let b = sizer.size("ETHUSDT", dec!(1234.56), dec!(3210.5), Some(&l));
        assert_eq!(a, b);
        assert_eq!(a, dec!(0.23));
    }
}
