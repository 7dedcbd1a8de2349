// =============================================================================
// Indicator Snapshot: typed indicator values at the decision candle
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::{calculate_adx, calculate_atr, calculate_macd, latest_ema, latest_rsi};
use crate::market_data::Candle;
use crate::scoring::config::ScoringConfig;

/// Names the value a snapshot could not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indicator {
    Close,
    Ema,
    Rsi,
    Atr,
    Adx,
    Macd,
    MacdSignal,
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Close => "close",
            Self::Ema => "EMA",
            Self::Rsi => "RSI",
            Self::Atr => "ATR",
            Self::Adx => "ADX",
            Self::Macd => "MACD",
            Self::MacdSignal => "MACD signal",
        };
        f.write_str(name)
    }
}

/// Indicator values at the most recent candle of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub ema: f64,
    pub rsi: f64,
    pub atr: f64,
    pub adx: f64,
    pub macd: f64,
    pub macd_signal: f64,
}

impl IndicatorSnapshot {
    /// Compute every indicator at the last candle of `candles`.
    ///
    /// Fails with the first indicator that is undefined there.
    pub fn compute(candles: &[Candle], config: &ScoringConfig) -> Result<Self, Indicator> {
        let close = candles
            .last()
            .map(|c| c.close)
            .filter(|c| c.is_finite())
            .ok_or(Indicator::Close)?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let ema = latest_ema(&closes, config.ema_length).ok_or(Indicator::Ema)?;
        let rsi = latest_rsi(&closes, config.rsi_length).ok_or(Indicator::Rsi)?;
        let atr = calculate_atr(candles, config.atr_length).ok_or(Indicator::Atr)?;
        let adx = calculate_adx(candles, config.adx_length).ok_or(Indicator::Adx)?;
        let macd = calculate_macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal)
            .ok_or(Indicator::Macd)?;

        let snapshot = Self {
            close,
            ema,
            rsi,
            atr,
            adx,
            macd: macd.macd,
            macd_signal: macd.signal,
        };

        debug!(
            close = snapshot.close,
            ema = snapshot.ema,
            rsi = format!("{:.2}", snapshot.rsi),
            atr = snapshot.atr,
            adx = format!("{:.2}", snapshot.adx),
            macd = snapshot.macd,
            macd_signal = snapshot.macd_signal,
            "indicator snapshot computed"
        );

        Ok(snapshot)
    }

    /// First field holding a non-finite value, if any.
    pub fn first_undefined(&self) -> Option<Indicator> {
        [
            (Indicator::Close, self.close),
            (Indicator::Ema, self.ema),
            (Indicator::Rsi, self.rsi),
            (Indicator::Atr, self.atr),
            (Indicator::Adx, self.adx),
            (Indicator::Macd, self.macd),
            (Indicator::MacdSignal, self.macd_signal),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(indicator, _)| indicator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                let t = i as i64 * 60_000;
                Candle::new(t, close - 1.0, close + 1.0, close - 1.0, close, 10.0, t + 59_999)
            })
            .collect()
    }

    #[test]
    fn computes_all_fields_at_warmup() {
        let snap = IndicatorSnapshot::compute(&ramp(200), &ScoringConfig::default()).unwrap();
        assert_eq!(snap.close, 299.0);
        assert!(snap.first_undefined().is_none());
        assert!(snap.close > snap.ema);
        assert!((snap.rsi - 100.0).abs() < 1e-10);
    }

    #[test]
    fn short_series_reports_missing_ema() {
        let err = IndicatorSnapshot::compute(&ramp(199), &ScoringConfig::default()).unwrap_err();
        assert_eq!(err, Indicator::Ema);
    }

    #[test]
    fn empty_series_reports_close() {
        let err = IndicatorSnapshot::compute(&[], &ScoringConfig::default()).unwrap_err();
        assert_eq!(err, Indicator::Close);
    }

    #[test]
    fn nan_field_is_detected() {
        let mut snap = IndicatorSnapshot::compute(&ramp(220), &ScoringConfig::default()).unwrap();
        snap.macd_signal = f64::NAN;
        assert_eq!(snap.first_undefined(), Some(Indicator::MacdSignal));
    }
}
