pub mod candle;
pub mod orderbook;
pub mod weekly;

// Re-export the core market types (e.g. `use crate::market_data::Candle`).
pub use candle::{validate_series, Candle};
pub use orderbook::{BookLevel, OrderBookSnapshot};
pub use weekly::weekly_momentum;
