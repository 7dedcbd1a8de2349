// =============================================================================
// Average True Range (ATR), Wilder's smoothing
// =============================================================================
//
//   TR_t   = max(H - L, |H - prevClose|, |L - prevClose|)
//   ATR_0  = SMA of the first `period` TR values
//   ATR_t  = (ATR_{t-1} * (period - 1) + TR_t) / period
// =============================================================================

use crate::market_data::Candle;

/// True range of every bar after the first (oldest first).
///
/// Returns `None` if any bar carries a non-finite price, since `f64::max`
/// would otherwise hide the NaN.
pub(crate) fn true_ranges(candles: &[Candle]) -> Option<Vec<f64>> {
    candles
        .windows(2)
        .map(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            if !(cur.high.is_finite() && cur.low.is_finite() && prev.close.is_finite()) {
                return None;
            }
            Some(
                (cur.high - cur.low)
                    .max((cur.high - prev.close).abs())
                    .max((cur.low - prev.close).abs()),
            )
        })
        .collect()
}

/// ATR at the last candle.
///
/// Returns `None` when `period` is zero, there are fewer than `period + 1`
/// candles, or any value is non-finite.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let tr = true_ranges(candles)?;
    let period_f = period as f64;

    let mut atr = tr[..period].iter().sum::<f64>() / period_f;
    for &value in &tr[period..] {
        atr = (atr * (period_f - 1.0) + value) / period_f;
    }

    atr.is_finite().then_some(atr)
}
