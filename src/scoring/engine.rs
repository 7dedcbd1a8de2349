// =============================================================================
// Scoring Engine: factor scoring and trade setup derivation
// =============================================================================
//
// Multi-factor policy (default):
//   weekly momentum   BULLISH +1 / BEARISH -1 / NEUTRAL 0
//   trend             close > EMA +1, otherwise -1
//   trend strength    ADX > threshold => +bonus (never a penalty)
//   pullback          RSI < oversold +1 / RSI > overbought -1
//   momentum          MACD > signal +1 / MACD < signal -1
//
//   score >= long threshold  => LONG   stop = close - k_s * ATR, target = close + k_t * ATR
//   score <= short threshold => SHORT  stop = close + k_s * ATR, target = close - k_t * ATR
//
// Two-factor policy:
//   LONG  when close > EMA and RSI < oversold
//   SHORT when close < EMA and RSI > overbought
//
// The engine is pure: identical inputs give identical verdicts. Undefined
// indicators, short series and non-finite imbalance abstain.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScanError;
use crate::market_data::Candle;
use crate::scoring::config::{AdxBonusMode, ScoringConfig, ScoringPolicy};
use crate::scoring::snapshot::{Indicator, IndicatorSnapshot};
use crate::types::{Direction, WeeklyMomentum};

/// One scored input of the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Factor {
    WeeklyMomentum,
    Trend,
    TrendStrength,
    Pullback,
    Momentum,
}

/// Points a factor added to (or removed from) the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: Factor,
    pub points: f64,
}

/// A suggested trade. Never persisted, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSetup {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub score: f64,
    pub adx: f64,
    pub rsi: f64,
    pub atr: f64,
    pub imbalance: f64,
    pub weekly_momentum: WeeklyMomentum,
    pub factors: Vec<FactorContribution>,
}

/// Why the engine declined to score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AbstainReason {
    InsufficientData { have: usize, need: usize },
    IndicatorUndefined(Indicator),
    NonFiniteImbalance,
    /// ATR is zero, so stop and target would collapse onto the entry.
    DegenerateVolatility,
}

impl std::fmt::Display for AbstainReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData { have, need } => {
                write!(f, "insufficient data ({have} < {need} candles)")
            }
            Self::IndicatorUndefined(indicator) => write!(f, "{indicator} undefined"),
            Self::NonFiniteImbalance => write!(f, "order book imbalance is not finite"),
            Self::DegenerateVolatility => write!(f, "ATR is zero"),
        }
    }
}

/// Outcome of scoring one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Setup(TradeSetup),
    Neutral {
        score: f64,
        factors: Vec<FactorContribution>,
    },
    Abstain(AbstainReason),
}

impl Verdict {
    pub fn setup(&self) -> Option<&TradeSetup> {
        match self {
            Self::Setup(setup) => Some(setup),
            _ => None,
        }
    }

    pub fn into_setup(self) -> Option<TradeSetup> {
        match self {
            Self::Setup(setup) => Some(setup),
            _ => None,
        }
    }

    /// The numeric score, when one was computed.
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Setup(setup) => Some(setup.score),
            Self::Neutral { score, .. } => Some(*score),
            Self::Abstain(_) => None,
        }
    }
}

/// Stateless scorer built from a validated [`ScoringConfig`].
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    required_warmup: usize,
}

impl ScoringEngine {
    /// Validate `config` and build the engine.
    pub fn new(config: ScoringConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let required_warmup = config.required_warmup();
        Ok(Self {
            config,
            required_warmup,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Minimum series length the engine will score.
    pub fn required_warmup(&self) -> usize {
        self.required_warmup
    }

    /// Score `series` and return a setup when a threshold is crossed.
    pub fn score(
        &self,
        series: &[Candle],
        imbalance: f64,
        weekly: WeeklyMomentum,
    ) -> Option<TradeSetup> {
        self.evaluate(series, imbalance, weekly).into_setup()
    }

    /// Score `series` and report the full verdict.
    pub fn evaluate(&self, series: &[Candle], imbalance: f64, weekly: WeeklyMomentum) -> Verdict {
        if series.len() < self.required_warmup {
            return Verdict::Abstain(AbstainReason::InsufficientData {
                have: series.len(),
                need: self.required_warmup,
            });
        }

        match self.snapshot(series) {
            Ok(snapshot) => self.decide(&snapshot, imbalance, weekly),
            Err(indicator) => Verdict::Abstain(AbstainReason::IndicatorUndefined(indicator)),
        }
    }

    /// Indicator snapshot at the last candle of `series`.
    pub fn snapshot(&self, series: &[Candle]) -> Result<IndicatorSnapshot, Indicator> {
        IndicatorSnapshot::compute(series, &self.config)
    }

    /// Apply the configured policy to an already computed snapshot.
    pub fn decide(
        &self,
        snapshot: &IndicatorSnapshot,
        imbalance: f64,
        weekly: WeeklyMomentum,
    ) -> Verdict {
        if let Some(indicator) = snapshot.first_undefined() {
            return Verdict::Abstain(AbstainReason::IndicatorUndefined(indicator));
        }
        if !imbalance.is_finite() {
            return Verdict::Abstain(AbstainReason::NonFiniteImbalance);
        }

        let (factors, direction) = match self.config.policy {
            ScoringPolicy::MultiFactor => self.multi_factor(snapshot, weekly),
            ScoringPolicy::TwoFactor => self.two_factor(snapshot),
        };
        let score: f64 = factors.iter().map(|f| f.points).sum();

        debug!(
            policy = ?self.config.policy,
            score,
            direction = ?direction,
            weekly = %weekly,
            "snapshot scored"
        );

        let Some(direction) = direction else {
            return Verdict::Neutral { score, factors };
        };

        if snapshot.atr <= 0.0 {
            return Verdict::Abstain(AbstainReason::DegenerateVolatility);
        }

        let stop_distance = self.config.stop_atr_multiplier * snapshot.atr;
        let target_distance = self.config.target_atr_multiplier * snapshot.atr;
        let (stop_loss, take_profit) = match direction {
            Direction::Long => (snapshot.close - stop_distance, snapshot.close + target_distance),
            Direction::Short => (snapshot.close + stop_distance, snapshot.close - target_distance),
        };

        Verdict::Setup(TradeSetup {
            direction,
            entry_price: snapshot.close,
            stop_loss,
            take_profit,
            score,
            adx: snapshot.adx,
            rsi: snapshot.rsi,
            atr: snapshot.atr,
            imbalance,
            weekly_momentum: weekly,
            factors,
        })
    }

    fn multi_factor(
        &self,
        snap: &IndicatorSnapshot,
        weekly: WeeklyMomentum,
    ) -> (Vec<FactorContribution>, Option<Direction>) {
        let cfg = &self.config;

        let weekly_points = match weekly {
            WeeklyMomentum::Bullish => 1.0,
            WeeklyMomentum::Bearish => -1.0,
            WeeklyMomentum::Neutral => 0.0,
        };
        let trend_points = if snap.close > snap.ema { 1.0 } else { -1.0 };
        let pullback_points = self.pullback_points(snap.rsi);
        let momentum_points = if snap.macd > snap.macd_signal {
            1.0
        } else if snap.macd < snap.macd_signal {
            -1.0
        } else {
            0.0
        };

        let directional = weekly_points + trend_points + pullback_points + momentum_points;
        let strength_points = if snap.adx > cfg.adx_threshold {
            match cfg.adx_bonus_mode {
                AdxBonusMode::Unconditional => cfg.adx_bonus,
                AdxBonusMode::Directional if directional > 0.0 => cfg.adx_bonus,
                AdxBonusMode::Directional if directional < 0.0 => -cfg.adx_bonus,
                AdxBonusMode::Directional => 0.0,
            }
        } else {
            0.0
        };

        let factors = vec![
            FactorContribution { factor: Factor::WeeklyMomentum, points: weekly_points },
            FactorContribution { factor: Factor::Trend, points: trend_points },
            FactorContribution { factor: Factor::TrendStrength, points: strength_points },
            FactorContribution { factor: Factor::Pullback, points: pullback_points },
            FactorContribution { factor: Factor::Momentum, points: momentum_points },
        ];

        let score = directional + strength_points;
        let direction = if score >= cfg.long_score_threshold {
            Some(Direction::Long)
        } else if score <= cfg.short_score_threshold {
            Some(Direction::Short)
        } else {
            None
        };

        (factors, direction)
    }

    fn two_factor(&self, snap: &IndicatorSnapshot) -> (Vec<FactorContribution>, Option<Direction>) {
        let trend_points = if snap.close > snap.ema {
            1.0
        } else if snap.close < snap.ema {
            -1.0
        } else {
            0.0
        };
        let pullback_points = self.pullback_points(snap.rsi);

        let direction = if trend_points > 0.0 && pullback_points > 0.0 {
            Some(Direction::Long)
        } else if trend_points < 0.0 && pullback_points < 0.0 {
            Some(Direction::Short)
        } else {
            None
        };

        let factors = vec![
            FactorContribution { factor: Factor::Trend, points: trend_points },
            FactorContribution { factor: Factor::Pullback, points: pullback_points },
        ];
        (factors, direction)
    }

    /// Strict comparisons: RSI exactly on a bound contributes nothing.
    fn pullback_points(&self, rsi: f64) -> f64 {
        if rsi < self.config.rsi_oversold {
            1.0
        } else if rsi > self.config.rsi_overbought {
            -1.0
        } else {
            0.0
        }
    }
}
