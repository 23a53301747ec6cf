//! Breakout confirmation for entry-side pyramiding.

use crate::models::Candle;

#[derive(Debug, Clone, Copy)]
pub struct BreakoutFilter {
    pub lookback: usize,
}

impl Default for BreakoutFilter {
    fn default() -> Self {
        Self { lookback: 20 }
    }
}

impl BreakoutFilter {
    /// True when the latest close clears the highest high (long) or lowest low
    /// (short) of the `lookback` candles before it.
    pub fn confirms(&self, candles: &[Candle], is_long: bool) -> bool {
        let Some((last, prior)) = candles.split_last() else {
            return false;
        };
        if self.lookback == 0 || prior.len() < self.lookback {
            return false;
        }

        let window = &prior[prior.len() - self.lookback..];
        if is_long {
            window.iter().map(|c| c.high).max().is_some_and(|high| last.close > high)
        } else {
            window.iter().map(|c| c.low).min().is_some_and(|low| last.close < low)
        }
    }
}
