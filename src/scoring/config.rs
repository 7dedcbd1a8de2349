// =============================================================================
// Scoring Configuration
// =============================================================================
//
// Every field carries a serde default so a partial JSON block (or none at
// all) yields the multi-factor policy. `validate()` is the only gate: an
// invalid value is rejected, never clamped.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Upper bound on any length or warm-up; one kline request never returns
/// more candles.
pub const MAX_SERIES_LENGTH: usize = 1000;

/// Which rule set turns factors into a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Weekly momentum, trend, ADX bonus, RSI pullback and MACD confirmation,
    /// summed and compared against the long/short score thresholds.
    MultiFactor,
    /// LONG when close > EMA and RSI is oversold; SHORT when close < EMA and
    /// RSI is overbought.
    TwoFactor,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::MultiFactor
    }
}

/// How the ADX trend-strength bonus is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdxBonusMode {
    /// `ADX > threshold` always adds the bonus.
    Unconditional,
    /// The bonus follows the sign of the other factors (0 when they cancel).
    Directional,
}

impl Default for AdxBonusMode {
    fn default() -> Self {
        Self::Unconditional
    }
}

fn default_ema_length() -> usize {
    200
}

fn default_period_14() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_adx_threshold() -> f64 {
    20.0
}

fn default_adx_bonus() -> f64 {
    0.5
}

fn default_rsi_oversold() -> f64 {
    40.0
}

fn default_rsi_overbought() -> f64 {
    60.0
}

fn default_long_score_threshold() -> f64 {
    3.5
}

fn default_short_score_threshold() -> f64 {
    -3.5
}

fn default_stop_atr_multiplier() -> f64 {
    2.0
}

fn default_target_atr_multiplier() -> f64 {
    4.0
}

fn default_candle_warmup() -> usize {
    200
}

/// Indicator lengths, thresholds and setup sizing for the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub policy: ScoringPolicy,

    // --- Indicator lengths --------------------------------------------------
    #[serde(default = "default_ema_length")]
    pub ema_length: usize,

    #[serde(default = "default_period_14")]
    pub rsi_length: usize,

    #[serde(default = "default_period_14")]
    pub atr_length: usize,

    #[serde(default = "default_period_14")]
    pub adx_length: usize,

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,

    // --- Factor thresholds --------------------------------------------------
    /// ADX strictly above this earns the trend-strength bonus.
    #[serde(default = "default_adx_threshold")]
    pub adx_threshold: f64,

    #[serde(default = "default_adx_bonus")]
    pub adx_bonus: f64,

    #[serde(default)]
    pub adx_bonus_mode: AdxBonusMode,

    /// RSI strictly below this counts as a pullback (+1).
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,

    /// RSI strictly above this counts as overbought (-1).
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,

    // --- Decision -----------------------------------------------------------
    /// Score at or above this emits a LONG setup.
    #[serde(default = "default_long_score_threshold")]
    pub long_score_threshold: f64,

    /// Score at or below this emits a SHORT setup.
    #[serde(default = "default_short_score_threshold")]
    pub short_score_threshold: f64,

    // --- Setup sizing -------------------------------------------------------
    #[serde(default = "default_stop_atr_multiplier")]
    pub stop_atr_multiplier: f64,

    #[serde(default = "default_target_atr_multiplier")]
    pub target_atr_multiplier: f64,

    /// Minimum series length before anything is scored.
    #[serde(default = "default_candle_warmup")]
    pub candle_warmup: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            policy: ScoringPolicy::default(),
            ema_length: default_ema_length(),
            rsi_length: default_period_14(),
            atr_length: default_period_14(),
            adx_length: default_period_14(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            adx_threshold: default_adx_threshold(),
            adx_bonus: default_adx_bonus(),
            adx_bonus_mode: AdxBonusMode::default(),
            rsi_oversold: default_rsi_oversold(),
            rsi_overbought: default_rsi_overbought(),
            long_score_threshold: default_long_score_threshold(),
            short_score_threshold: default_short_score_threshold(),
            stop_atr_multiplier: default_stop_atr_multiplier(),
            target_atr_multiplier: default_target_atr_multiplier(),
            candle_warmup: default_candle_warmup(),
        }
    }
}

impl ScoringConfig {
    /// The EMA-200 / RSI-14 rule set of the earliest scanner.
    pub fn two_factor() -> Self {
        Self {
            policy: ScoringPolicy::TwoFactor,
            ..Self::default()
        }
    }

    /// Longest history any configured indicator needs to be defined at the
    /// last candle.
    pub fn indicator_warmup(&self) -> usize {
        [
            self.ema_length,
            self.rsi_length + 1,
            self.atr_length + 1,
            2 * self.adx_length + 1,
            self.macd_slow + self.macd_signal.saturating_sub(1),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Series length below which the engine abstains.
    pub fn required_warmup(&self) -> usize {
        self.candle_warmup.max(self.indicator_warmup())
    }

    /// Reject values outside sane bounds.
    pub fn validate(&self) -> Result<(), ScanError> {
        let lengths = [
            ("ema_length", self.ema_length),
            ("rsi_length", self.rsi_length),
            ("atr_length", self.atr_length),
            ("adx_length", self.adx_length),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
        ];
        for (name, value) in lengths {
            if value == 0 {
                return Err(ScanError::config(format!("{name} must be positive")));
            }
            if value > MAX_SERIES_LENGTH {
                return Err(ScanError::config(format!(
                    "{name} ({value}) exceeds {MAX_SERIES_LENGTH}"
                )));
            }
        }
        if self.candle_warmup > MAX_SERIES_LENGTH {
            return Err(ScanError::config(format!(
                "candle_warmup ({}) exceeds {MAX_SERIES_LENGTH}",
                self.candle_warmup
            )));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ScanError::config(format!(
                "macd_fast ({}) must be shorter than macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }

        let reals = [
            ("adx_threshold", self.adx_threshold),
            ("adx_bonus", self.adx_bonus),
            ("rsi_oversold", self.rsi_oversold),
            ("rsi_overbought", self.rsi_overbought),
            ("long_score_threshold", self.long_score_threshold),
            ("short_score_threshold", self.short_score_threshold),
            ("stop_atr_multiplier", self.stop_atr_multiplier),
            ("target_atr_multiplier", self.target_atr_multiplier),
        ];
        for (name, value) in reals {
            if !value.is_finite() {
                return Err(ScanError::config(format!("{name} must be finite")));
            }
        }

        if !(0.0..=100.0).contains(&self.adx_threshold) {
            return Err(ScanError::config("adx_threshold must lie in [0, 100]"));
        }
        if self.adx_bonus < 0.0 {
            return Err(ScanError::config("adx_bonus must not be negative"));
        }
        if !(0.0..=100.0).contains(&self.rsi_oversold)
            || !(0.0..=100.0).contains(&self.rsi_overbought)
        {
            return Err(ScanError::config("RSI thresholds must lie in [0, 100]"));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(ScanError::config(format!(
                "rsi_oversold ({}) must be below rsi_overbought ({})",
                self.rsi_oversold, self.rsi_overbought
            )));
        }
        if self.long_score_threshold <= 0.0 || self.short_score_threshold >= 0.0 {
            return Err(ScanError::config(
                "long_score_threshold must be positive and short_score_threshold negative",
            ));
        }
        if self.stop_atr_multiplier <= 0.0 || self.target_atr_multiplier <= 0.0 {
            return Err(ScanError::config("ATR multipliers must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_richest_policy() {
        let cfg = ScoringConfig::default();
        assert_eq!(cfg.policy, ScoringPolicy::MultiFactor);
        assert_eq!(cfg.ema_length, 200);
        assert_eq!(cfg.rsi_length, 14);
        assert_eq!(cfg.adx_bonus_mode, AdxBonusMode::Unconditional);
        assert!((cfg.long_score_threshold - 3.5).abs() < f64::EPSILON);
        assert!((cfg.short_score_threshold + 3.5).abs() < f64::EPSILON);
        assert_eq!(cfg.required_warmup(), 200);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn two_factor_preset_validates() {
        let cfg = ScoringConfig::two_factor();
        assert_eq!(cfg.policy, ScoringPolicy::TwoFactor);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_json_uses_defaults() {
        let cfg: ScoringConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ScoringConfig::default());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{ "policy": "two_factor", "adx_bonus_mode": "directional", "ema_length": 100 }"#;
        let cfg: ScoringConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.policy, ScoringPolicy::TwoFactor);
        assert_eq!(cfg.adx_bonus_mode, AdxBonusMode::Directional);
        assert_eq!(cfg.ema_length, 100);
        assert_eq!(cfg.macd_slow, 26);
    }

    #[test]
    fn warmup_follows_longest_indicator() {
        let cfg = ScoringConfig {
            candle_warmup: 10,
            ema_length: 50,
            adx_length: 30,
            ..ScoringConfig::default()
        };
        // ADX needs 2 * 30 + 1 candles.
        assert_eq!(cfg.required_warmup(), 61);
    }

    #[test]
    fn rejects_zero_length() {
        let cfg = ScoringConfig {
            rsi_length: 0,
            ..ScoringConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ScanError::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_oversized_lengths() {
        let huge = ScoringConfig {
            adx_length: usize::MAX / 2 + 1,
            ..ScoringConfig::default()
        };
        assert!(matches!(huge.validate(), Err(ScanError::ConfigInvalid(_))));

        let slow = ScoringConfig {
            macd_slow: usize::MAX,
            ..ScoringConfig::default()
        };
        assert!(slow.validate().is_err());

        let warmup = ScoringConfig {
            candle_warmup: usize::MAX,
            ..ScoringConfig::default()
        };
        assert!(warmup.validate().is_err());

        let at_cap = ScoringConfig {
            ema_length: MAX_SERIES_LENGTH,
            candle_warmup: MAX_SERIES_LENGTH,
            ..ScoringConfig::default()
        };
        assert!(at_cap.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_macd() {
        let cfg = ScoringConfig {
            macd_fast: 26,
            macd_slow: 12,
            ..ScoringConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_rsi_bounds() {
        let cfg = ScoringConfig {
            rsi_oversold: 60.0,
            rsi_overbought: 40.0,
            ..ScoringConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_score_thresholds() {
        let nan = ScoringConfig {
            long_score_threshold: f64::NAN,
            ..ScoringConfig::default()
        };
        assert!(nan.validate().is_err());

        let same_side = ScoringConfig {
            short_score_threshold: 1.0,
            ..ScoringConfig::default()
        };
        assert!(same_side.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_multiplier() {
        let cfg = ScoringConfig {
            stop_atr_multiplier: 0.0,
            ..ScoringConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
