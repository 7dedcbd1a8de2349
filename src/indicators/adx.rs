// =============================================================================
// Average Directional Index (ADX)
// =============================================================================
//
// ADX measures trend strength regardless of direction.
//
//   1. +DM / -DM and True Range per bar.
//   2. Wilder-smooth the three series (running sums over `period`).
//   3. +DI = 100 * sm(+DM) / sm(TR),  -DI = 100 * sm(-DM) / sm(TR)
//   4. DX  = 100 * |+DI - -DI| / (+DI + -DI)
//   5. ADX = Wilder average of DX, seeded with the SMA of the first `period`.
//
// Readings below ~20 describe a market without a trend.
// =============================================================================

use crate::indicators::atr::true_ranges;
use crate::market_data::Candle;

/// ADX at the last candle.
///
/// Returns `None` when:
/// - `period` is zero,
/// - there are fewer than `2 * period + 1` candles,
/// - any price is non-finite, or
/// - fewer than `period` smoothing windows carry any true range.
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < 2 * period + 1 {
        return None;
    }
    if !candles
        .iter()
        .all(|c| c.high.is_finite() && c.low.is_finite() && c.close.is_finite())
    {
        return None;
    }

    let tr = true_ranges(candles)?;
    let (plus_dm, minus_dm): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|w| {
            let up = w[1].high - w[0].high;
            let down = w[0].low - w[1].low;
            let plus = if up > down && up > 0.0 { up } else { 0.0 };
            let minus = if down > up && down > 0.0 { down } else { 0.0 };
            (plus, minus)
        })
        .unzip();

    let period_f = period as f64;
    let bars = tr.len();

    let mut sm_plus: f64 = plus_dm[..period].iter().sum();
    let mut sm_minus: f64 = minus_dm[..period].iter().sum();
    let mut sm_tr: f64 = tr[..period].iter().sum();

    // Windows without any range have no DX; the average starts after them.
    let mut dx_values = Vec::with_capacity(bars - period + 1);
    dx_values.extend(directional_index(sm_plus, sm_minus, sm_tr));

    for i in period..bars {
        sm_plus = sm_plus - sm_plus / period_f + plus_dm[i];
        sm_minus = sm_minus - sm_minus / period_f + minus_dm[i];
        sm_tr = sm_tr - sm_tr / period_f + tr[i];
        dx_values.extend(directional_index(sm_plus, sm_minus, sm_tr));
    }

    if dx_values.len() < period {
        return None;
    }

    let mut adx = dx_values[..period].iter().sum::<f64>() / period_f;
    for &dx in &dx_values[period..] {
        adx = (adx * (period_f - 1.0) + dx) / period_f;
    }

    adx.is_finite().then_some(adx)
}

/// DX from smoothed +DM, -DM and TR. `None` on a zero true range.
fn directional_index(sm_plus: f64, sm_minus: f64, sm_tr: f64) -> Option<f64> {
    if sm_tr == 0.0 {
        return None;
    }

    let plus_di = sm_plus / sm_tr * 100.0;
    let minus_di = sm_minus / sm_tr * 100.0;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return Some(0.0);
    }

    let dx = (plus_di - minus_di).abs() / di_sum * 100.0;
    dx.is_finite().then_some(dx)
}
