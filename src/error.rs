use thiserror::Error;

/// Errors surfaced by the scanner library.
///
/// Scoring abstentions are not errors; they are reported through
/// [`crate::scoring::Verdict::Abstain`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("request blocked by rate limit (used {used}, requested {requested}, limit {limit})")]
    RateLimited { used: u32, requested: u32, limit: u32 },

    #[error("exchange returned HTTP {status} for {endpoint}: {body}")]
    Exchange {
        endpoint: String,
        status: u16,
        body: String,
    },
}

impl ScanError {
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid(reason.into())
    }
}
