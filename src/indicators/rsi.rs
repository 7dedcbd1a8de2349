// =============================================================================
// Relative Strength Index (RSI), Wilder's smoothing
// =============================================================================
//
//   seed:     avg_gain / avg_loss = SMA of the first `period` gains / losses
//   then:     avg = (prev_avg * (period - 1) + current) / period
//   RSI     = 100 - 100 / (1 + avg_gain / avg_loss)
// =============================================================================

/// Compute the RSI series for `closes`.
///
/// Output index `i` corresponds to close index `i + period`. Returns an empty
/// `Vec` when `period == 0` or there are fewer than `period + 1` closes. The
/// series stops at the first non-finite value.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let period_f = period as f64;
    let (gains, losses) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });
    let mut avg_gain = gains / period_f;
    let mut avg_loss = losses / period_f;

    let mut out = Vec::with_capacity(deltas.len() - period + 1);
    match rsi_from_averages(avg_gain, avg_loss) {
        Some(rsi) => out.push(rsi),
        None => return out,
    }

    for &delta in &deltas[period..] {
        // f64::max would silently swallow a NaN delta.
        if !delta.is_finite() {
            break;
        }
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => out.push(rsi),
            None => break,
        }
    }

    out
}

/// RSI at the last close, or `None` if it is undefined there.
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    let series = calculate_rsi(closes, period);
    if series.len() + period != closes.len() {
        return None;
    }
    series.last().copied()
}

/// Flat market => 50, no losses => 100.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_gain == 0.0 && avg_loss == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };

    rsi.is_finite().then_some(rsi)
}
