// =============================================================================
// Signal Scanner: multi-factor trade setup scoring for crypto markets
// =============================================================================

pub mod binance;
pub mod config;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod provider;
pub mod scanner;
pub mod scoring;
pub mod types;

pub use error::ScanError;
