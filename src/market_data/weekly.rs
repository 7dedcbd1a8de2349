// =============================================================================
// Weekly Momentum: macro trend from completed weekly closes
// =============================================================================
//
// The still-forming week is discarded, then the last two completed closes are
// compared:
//   last > previous  => BULLISH
//   last < previous  => BEARISH
//   otherwise        => NEUTRAL (also when fewer than two weeks are complete)
// =============================================================================

use tracing::debug;

use crate::market_data::Candle;
use crate::types::WeeklyMomentum;

/// Derive the weekly momentum from weekly candles (oldest first) as seen at
/// `now_ms`.
pub fn weekly_momentum(weekly: &[Candle], now_ms: i64) -> WeeklyMomentum {
    let mut completed = weekly.iter().rev().filter(|c| c.is_closed_at(now_ms));

    let (Some(last), Some(previous)) = (completed.next(), completed.next()) else {
        debug!(candles = weekly.len(), "weekly momentum: fewer than 2 completed weeks");
        return WeeklyMomentum::Neutral;
    };

    if !last.close.is_finite() || !previous.close.is_finite() {
        return WeeklyMomentum::Neutral;
    }

    if last.close > previous.close {
        WeeklyMomentum::Bullish
    } else if last.close < previous.close {
        WeeklyMomentum::Bearish
    } else {
        WeeklyMomentum::Neutral
    }
}
