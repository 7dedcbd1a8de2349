// =============================================================================
// Signal Scoring Engine
// =============================================================================
//
// Turns a candle series plus auxiliary signals (order book imbalance, weekly
// momentum) into zero or one trade setup:
// - `config`: scoring policy, indicator lengths and thresholds
// - `snapshot`: typed indicator values at the decision candle
// - `engine`: factor scoring, decision thresholds, setup derivation

pub mod config;
pub mod engine;
pub mod snapshot;

pub use config::{AdxBonusMode, ScoringConfig, ScoringPolicy};
pub use engine::{
    AbstainReason, Factor, FactorContribution, ScoringEngine, TradeSetup, Verdict,
};
pub use snapshot::{Indicator, IndicatorSnapshot};
