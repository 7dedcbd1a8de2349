// =============================================================================
// Scanner Configuration: JSON settings with atomic save and env overrides
// =============================================================================
//
// Every field carries a serde default so that an older or partial config file
// still loads. Persistence uses a tmp + rename write so a crash never leaves a
// truncated file behind.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::binance::client::{DEFAULT_BASE_URL, MAX_KLINES};
use crate::error::ScanError;
use crate::scoring::ScoringConfig;
use crate::types::Timeframe;

pub const DEFAULT_CONFIG_PATH: &str = "scanner_config.json";

// =============================================================================
// Default-value helpers
// =============================================================================

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "SOLUSDT".to_string(),
        "ADAUSDT".to_string(),
        "XRPUSDT".to_string(),
    ]
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_top_n() -> usize {
    30
}

fn default_candle_limit() -> usize {
    300
}

fn default_order_book_depth() -> usize {
    10
}

fn default_weekly_candle_limit() -> usize {
    3
}

fn default_inter_symbol_delay_ms() -> u64 {
    100
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_max_concurrency() -> usize {
    1
}

/// Where the scan universe comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolSource {
    /// The configured `symbols` list.
    Fixed,
    /// The most liquid `top_n` pairs against `quote_asset`.
    #[default]
    TopByVolume,
}

// =============================================================================
// ScannerConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    // --- Exchange ------------------------------------------------------------

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Secondary REST endpoint tried when a primary call fails.
    #[serde(default)]
    pub fallback_base_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // --- Universe ------------------------------------------------------------

    #[serde(default)]
    pub symbol_source: SymbolSource,

    /// Scanned when `symbol_source` is `fixed`.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,

    #[serde(default = "default_top_n")]
    pub top_n: usize,

    // --- Data ----------------------------------------------------------------

    #[serde(default)]
    pub timeframe: Timeframe,

    /// Candles requested per symbol. Must cover the scoring warm-up.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,

    /// Levels per side summed into the order book imbalance.
    #[serde(default = "default_order_book_depth")]
    pub order_book_depth: usize,

    #[serde(default = "default_weekly_candle_limit")]
    pub weekly_candle_limit: usize,

    /// Score on the last closed candle instead of the in-progress one.
    #[serde(default)]
    pub drop_open_candle: bool,

    // --- Pacing --------------------------------------------------------------

    /// Minimum spacing between two symbol starts.
    #[serde(default = "default_inter_symbol_delay_ms")]
    pub inter_symbol_delay_ms: u64,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    // --- Scoring -------------------------------------------------------------

    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fallback_base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            symbol_source: SymbolSource::default(),
            symbols: default_symbols(),
            quote_asset: default_quote_asset(),
            top_n: default_top_n(),
            timeframe: Timeframe::default(),
            candle_limit: default_candle_limit(),
            order_book_depth: default_order_book_depth(),
            weekly_candle_limit: default_weekly_candle_limit(),
            drop_open_candle: false,
            inter_symbol_delay_ms: default_inter_symbol_delay_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
            max_concurrency: default_max_concurrency(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scanner config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scanner config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol_source = ?config.symbol_source,
            timeframe = %config.timeframe,
            policy = ?config.scoring.policy,
            "scanner config loaded"
        );

        Ok(config)
    }

    /// Persist to `path` via a `.tmp` sibling and a rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise scanner config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "scanner config saved (atomic)");
        Ok(())
    }

    /// Apply `SCANNER_SYMBOLS` and `SCANNER_TIMEFRAME` from the process
    /// environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("SCANNER_SYMBOLS").ok().as_deref(),
            std::env::var("SCANNER_TIMEFRAME").ok().as_deref(),
        );
    }

    /// A non-empty symbol list switches the universe to a fixed list. An
    /// unparseable timeframe is ignored with a warning.
    pub fn apply_overrides(&mut self, symbols: Option<&str>, timeframe: Option<&str>) {
        if let Some(raw) = symbols {
            let parsed: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                info!(symbols = ?parsed, "symbol list overridden from environment");
                self.symbols = parsed;
                self.symbol_source = SymbolSource::Fixed;
            }
        }

        if let Some(raw) = timeframe {
            match raw.trim().parse::<Timeframe>() {
                Ok(tf) => self.timeframe = tf,
                Err(e) => warn!(value = raw, error = %e, "ignoring SCANNER_TIMEFRAME"),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn inter_symbol_delay(&self) -> Duration {
        Duration::from_millis(self.inter_symbol_delay_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Reject settings the scanner cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        self.scoring.validate()?;

        if self.base_url.trim().is_empty() {
            return Err(ScanError::config("base_url must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ScanError::config("request_timeout_secs must be positive"));
        }
        match self.symbol_source {
            SymbolSource::Fixed if self.symbols.is_empty() => {
                return Err(ScanError::config("symbols must not be empty for a fixed universe"));
            }
            SymbolSource::TopByVolume if self.top_n == 0 => {
                return Err(ScanError::config("top_n must be positive"));
            }
            SymbolSource::TopByVolume if self.quote_asset.trim().is_empty() => {
                return Err(ScanError::config("quote_asset must not be empty"));
            }
            _ => {}
        }

        let warmup = self.scoring.required_warmup();
        let needed = warmup + usize::from(self.drop_open_candle);
        if self.candle_limit < needed {
            return Err(ScanError::config(format!(
                "candle_limit {} is below the scoring warm-up of {needed} candles",
                self.candle_limit
            )));
        }
        if self.candle_limit > MAX_KLINES {
            return Err(ScanError::config(format!(
                "candle_limit {} exceeds the exchange maximum of {MAX_KLINES}",
                self.candle_limit
            )));
        }
        if self.order_book_depth == 0 {
            return Err(ScanError::config("order_book_depth must be positive"));
        }
        if self.weekly_candle_limit < 2 {
            return Err(ScanError::config("weekly_candle_limit must be at least 2"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ScanError::config("refresh_interval_secs must be positive"));
        }
        if self.max_concurrency == 0 {
            return Err(ScanError::config("max_concurrency must be positive"));
        }
        Ok(())
    }
}
