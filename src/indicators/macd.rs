// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD   = EMA(fast) - EMA(slow)
//   signal = EMA(MACD, signal_period)
//
// The MACD line starts where the slow EMA becomes defined (close index
// `slow - 1`), so the signal line needs `slow + signal - 1` closes.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::ema::calculate_ema;

/// MACD line and its signal line at the last close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
}

/// Compute the MACD line series, aligned to close index `slow - 1`.
///
/// Empty when `fast == 0`, `fast >= slow`, or there are fewer than `slow`
/// closes.
pub fn macd_line(closes: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    if fast == 0 || fast >= slow {
        return Vec::new();
    }

    let fast_ema = calculate_ema(closes, fast);
    let slow_ema = calculate_ema(closes, slow);

    // fast_ema[i] is at close i + fast - 1, slow_ema[j] at close j + slow - 1.
    let offset = slow - fast;
    if fast_ema.len() <= offset {
        return Vec::new();
    }

    fast_ema[offset..]
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect()
}

/// MACD and signal at the last close, or `None` if either is undefined there.
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdValue> {
    if signal_period == 0 || closes.len() < slow + signal_period - 1 {
        return None;
    }

    let line = macd_line(closes, fast, slow);
    // A truncated line (non-finite input) does not reach the last close.
    if line.len() + slow != closes.len() + 1 {
        return None;
    }

    let signal = calculate_ema(&line, signal_period);
    if signal.len() + signal_period != line.len() + 1 {
        return None;
    }

    let value = MacdValue {
        macd: *line.last()?,
        signal: *signal.last()?,
    };
    (value.macd.is_finite() && value.signal.is_finite()).then_some(value)
}
