// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
//   alpha  = 2 / (period + 1)
//   seed   = SMA of the first `period` values
//   EMA_t  = value_t * alpha + EMA_{t-1} * (1 - alpha)
// =============================================================================

/// Compute the EMA series of `values` for `period`.
///
/// Output index `i` corresponds to input index `i + period - 1`; nothing is
/// emitted for the warm-up positions. Returns an empty `Vec` when
/// `period == 0` or the input is shorter than `period`. The series stops at
/// the first non-finite value.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);

    let seed = values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);

    let mut prev = seed;
    for &value in &values[period..] {
        let ema = value * alpha + prev * (1.0 - alpha);
        if !ema.is_finite() {
            break;
        }
        out.push(ema);
        prev = ema;
    }

    out
}

/// EMA at the last input position, or `None` if it is undefined there.
pub fn latest_ema(values: &[f64], period: usize) -> Option<f64> {
    let series = calculate_ema(values, period);
    // A truncated series means the last position was never reached.
    if series.len() + period != values.len() + 1 {
        return None;
    }
    series.last().copied()
}
