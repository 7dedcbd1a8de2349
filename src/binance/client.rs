// =============================================================================
// Binance REST API Client: public market data endpoints
// =============================================================================
//
// Only unauthenticated endpoints are used: klines, order book depth and the
// 24h ticker. Every request is checked against the local weight budget first
// and the budget is refreshed from the response headers afterwards.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::RateLimitTracker;
use crate::error::ScanError;
use crate::market_data::orderbook::parse_depth;
use crate::market_data::{Candle, OrderBookSnapshot};
use crate::types::Timeframe;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Depth limits accepted by `/api/v3/depth`.
const DEPTH_LIMITS: [usize; 8] = [5, 10, 20, 50, 100, 500, 1000, 5000];
/// Maximum klines per request.
pub const MAX_KLINES: usize = 1000;
/// Weight of `/api/v3/ticker/24hr` without a symbol parameter.
const TICKER_ALL_WEIGHT: u32 = 80;

/// Stablecoins whose pairs against the quote asset carry no signal.
const STABLE_BASES: [&str; 7] = ["USDC", "BUSD", "TUSD", "FDUSD", "DAI", "USDP", "USDE"];
/// Leveraged-token suffixes on the base asset (e.g. BTCUP, ETHBEAR). A
/// short base such as JUP is a regular coin.
const LEVERAGED_SUFFIXES: [&str; 4] = ["UP", "DOWN", "BULL", "BEAR"];

/// 24h traded volume of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerVolume {
    pub symbol: String,
    pub quote_volume: f64,
}

/// Binance REST API client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceClient {
    /// Create a client against `base_url` (e.g. `https://api.binance.com`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines.
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, ...
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let limit = limit.clamp(1, MAX_KLINES);
        let query = format!("symbol={symbol}&interval={}&limit={limit}", interval.as_str());
        let body = self
            .get_json("/api/v3/klines", &query, klines_weight(limit))
            .await?;

        let candles = parse_klines(&body)?;
        debug!(symbol, interval = %interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// GET /api/v3/depth, truncated to the top `depth` levels per side.
    #[instrument(skip(self), name = "binance::get_depth")]
    pub async fn get_depth(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot> {
        let limit = depth_limit(depth);
        let query = format!("symbol={symbol}&limit={limit}");
        let body = self
            .get_json("/api/v3/depth", &query, depth_weight(limit))
            .await?;

        let mut book = parse_depth(&body).context("failed to parse depth response")?;
        book.truncate(depth);
        debug!(symbol, bids = book.bids.len(), asks = book.asks.len(), "depth fetched");
        Ok(book)
    }

    /// GET /api/v3/ticker/24hr for every symbol.
    #[instrument(skip(self), name = "binance::get_24h_volumes")]
    pub async fn get_24h_volumes(&self) -> Result<Vec<TickerVolume>> {
        let body = self
            .get_json("/api/v3/ticker/24hr", "", TICKER_ALL_WEIGHT)
            .await?;

        let raw = body
            .as_array()
            .context("ticker response is not an array")?;

        let tickers: Vec<TickerVolume> = raw
            .iter()
            .filter_map(|t| {
                let symbol = t["symbol"].as_str()?.to_string();
                let quote_volume = parse_str_f64(&t["quoteVolume"]).ok()?;
                Some(TickerVolume {
                    symbol,
                    quote_volume,
                })
            })
            .collect();

        debug!(count = tickers.len(), "24h tickers fetched");
        Ok(tickers)
    }

    /// Symbols quoted in `quote_asset`, most liquid first.
    pub async fn top_symbols_by_volume(&self, quote_asset: &str, limit: usize) -> Result<Vec<String>> {
        let tickers = self.get_24h_volumes().await?;
        Ok(select_top_symbols(tickers, quote_asset, limit))
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    async fn get_json(&self, path: &str, query: &str, weight: u32) -> Result<serde_json::Value> {
        self.rate_limit.check(weight)?;

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScanError::Exchange {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        resp.json()
            .await
            .with_context(|| format!("failed to parse {path} response"))
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

/// Parse the kline array-of-arrays payload.
fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;
        if arr.len() < 7 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().context("kline open time is not an integer")?;
        let close_time = arr[6].as_i64().context("kline close time is not an integer")?;
        candles.push(Candle::new(
            open_time,
            parse_str_f64(&arr[1])?,
            parse_str_f64(&arr[2])?,
            parse_str_f64(&arr[3])?,
            parse_str_f64(&arr[4])?,
            parse_str_f64(&arr[5])?,
            close_time,
        ));
    }
    Ok(candles)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

/// Rank `tickers` quoted in `quote_asset` by 24h quote volume, dropping
/// leveraged tokens and stablecoin pairs.
pub fn select_top_symbols(
    mut tickers: Vec<TickerVolume>,
    quote_asset: &str,
    limit: usize,
) -> Vec<String> {
    let quote = quote_asset.to_uppercase();
    tickers.retain(|t| {
        let Some(base) = t.symbol.strip_suffix(quote.as_str()) else {
            return false;
        };
        !base.is_empty()
            && t.quote_volume.is_finite()
            && !STABLE_BASES.contains(&base)
            && !LEVERAGED_SUFFIXES
                .iter()
                .any(|suffix| base.len() >= suffix.len() + 3 && base.ends_with(suffix))
    });
    tickers.sort_by(|a, b| b.quote_volume.total_cmp(&a.quote_volume));
    tickers.into_iter().take(limit).map(|t| t.symbol).collect()
}

/// Smallest accepted depth limit that covers `depth`.
fn depth_limit(depth: usize) -> usize {
    DEPTH_LIMITS
        .iter()
        .copied()
        .find(|&l| l >= depth)
        .unwrap_or(DEPTH_LIMITS[DEPTH_LIMITS.len() - 1])
}

fn depth_weight(limit: usize) -> u32 {
    match limit {
        0..=100 => 5,
        101..=500 => 25,
        501..=1000 => 50,
        _ => 250,
    }
}

fn klines_weight(limit: usize) -> u32 {
    match limit {
        0..=99 => 1,
        100..=499 => 2,
        500..=1000 => 5,
        _ => 10,
    }
}
