// =============================================================================
// Technical Indicators
// =============================================================================
//
// Pure functions over close prices or candles. Undefined values (insufficient
// warm-up, zero divisors, non-finite inputs) come back as `None` or an empty
// series, never as NaN or zero.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;

pub use adx::calculate_adx;
pub use atr::calculate_atr;
pub use ema::{calculate_ema, latest_ema};
pub use macd::{calculate_macd, MacdValue};
pub use rsi::{calculate_rsi, latest_rsi};
