//! Trend following: EMA crossover confirmed by the MACD histogram.

use tracing::debug;

use crate::models::Signal;

use super::indicators::{ema, macd};

#[derive(Debug, Clone, Copy)]
pub struct TrendStrategy {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for TrendStrategy {
    fn default() -> Self {
        Self { fast: 12, slow: 26, signal: 9 }
    }
}

impl TrendStrategy {
    /// LONG when the fast EMA is above the slow one and momentum is rising,
    /// SHORT on the mirror image, NONE otherwise or on short history.
    pub fn evaluate(&self, closes: &[f64]) -> Signal {
        let (Some(fast), Some(slow), Some(m)) = (
            ema(closes, self.fast),
            ema(closes, self.slow),
            macd(closes, self.fast, self.slow, self.signal),
        ) else {
            return Signal::None;
        };

        let signal = if fast > slow && m.histogram > 0.0 {
            Signal::Long
        } else if fast < slow && m.histogram < 0.0 {
            Signal::Short
        } else {
            Signal::None
        };

        debug!(fast, slow, histogram = m.histogram, %signal, "Trend evaluated");
        signal
    }
}
