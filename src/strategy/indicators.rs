//! Technical indicators over close series.
//!
//! All functions work on `f64` and return `None` when the series is too short
//! for the requested period.

use rust_decimal::prelude::ToPrimitive;
use statrs::statistics::Statistics;

use crate::models::Candle;

/// Close prices as `f64`, oldest first. Unconvertible values are dropped.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().filter_map(|c| c.close.to_f64()).collect()
}

/// Exponential moving average series, seeded with the SMA of the first
/// `period` values. Element `i` corresponds to `values[i + period - 1]`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut current = values[..period].mean();
    out.push(current);
    for &v in &values[period..] {
        current = alpha * v + (1.0 - alpha) * current;
        out.push(current);
    }
    out
}

pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}

/// Relative strength index from the average gain and loss over the last
/// `period` price changes.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let window = &values[values.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), d| if d >= 0.0 { (g + d, l) } else { (g, l - d) });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD line (fast EMA minus slow EMA), its signal EMA, and the histogram.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || fast >= slow {
        return None;
    }

    let fast_series = ema_series(values, fast);
    let slow_series = ema_series(values, slow);
    if slow_series.is_empty() {
        return None;
    }

    // align both series on the slow EMA's first value
    let offset = slow - fast;
    let line: Vec<f64> = slow_series
        .iter()
        .zip(&fast_series[offset..])
        .map(|(s, f)| f - s)
        .collect();

    let signal_line = ema(&line, signal)?;
    let macd = *line.last()?;
    Some(Macd {
        macd,
        signal: signal_line,
        histogram: macd - signal_line,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger bands over the last `window` values, `k` sample standard
/// deviations either side of the mean.
pub fn bollinger(values: &[f64], window: usize, k: f64) -> Option<Bands> {
    if window < 2 || values.len() < window {
        return None;
    }

    let tail = &values[values.len() - window..];
    let middle = tail.mean();
    let std_dev = tail.std_dev();
    Some(Bands {
        upper: middle + k * std_dev,
        middle,
        lower: middle - k * std_dev,
    })
}
