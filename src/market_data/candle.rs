// =============================================================================
// Candle: one immutable OHLCV sample of a fixed-timeframe series
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// A single OHLCV candle. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
        }
    }

    /// Whether the candle's interval had ended at `now_ms`.
    pub fn is_closed_at(&self, now_ms: i64) -> bool {
        self.close_time < now_ms
    }

    fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Check that `candles` forms a usable series: strictly increasing
/// `open_time` and finite OHLCV values.
///
/// Gaps between candles are not detected.
pub fn validate_series(symbol: &str, candles: &[Candle]) -> Result<(), ScanError> {
    for (i, candle) in candles.iter().enumerate() {
        if !candle.is_finite() {
            return Err(ScanError::data_unavailable(
                symbol,
                format!("non-finite value in candle {i} (open_time={})", candle.open_time),
            ));
        }
        if i > 0 && candle.open_time <= candles[i - 1].open_time {
            return Err(ScanError::data_unavailable(
                symbol,
                format!(
                    "candle {i} is out of order ({} <= {})",
                    candle.open_time,
                    candles[i - 1].open_time
                ),
            ));
        }
    }
    Ok(())
}
