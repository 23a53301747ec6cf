//! Mean reversion: RSI extreme together with a Bollinger band touch.

use tracing::debug;

use crate::models::Signal;

use super::indicators::{bollinger, rsi};

#[derive(Debug, Clone, Copy)]
pub struct RevertStrategy {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub boll_window: usize,
    pub boll_stddev: f64,
}

impl Default for RevertStrategy {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            oversold: 40.0,
            overbought: 60.0,
            boll_window: 20,
            boll_stddev: 2.0,
        }
    }
}

impl RevertStrategy {
    /// LONG when oversold at or below the lower band, SHORT when overbought at
    /// or above the upper band.
    pub fn evaluate(&self, closes: &[f64]) -> Signal {
        let (Some(rsi), Some(bands), Some(&last)) = (
            rsi(closes, self.rsi_period),
            bollinger(closes, self.boll_window, self.boll_stddev),
            closes.last(),
        ) else {
            return Signal::None;
        };

        let signal = if rsi < self.oversold && last <= bands.lower {
            Signal::Long
        } else if rsi > self.overbought && last >= bands.upper {
            Signal::Short
        } else {
            Signal::None
        };

        debug!(rsi, last, lower = bands.lower, upper = bands.upper, %signal, "Reversion evaluated");
        signal
    }
}
