// =============================================================================
// Market Data Provider: the I/O seam between the scanner and an exchange
// =============================================================================
//
// Providers are constructed explicitly and handed to the scanner; there is no
// process-wide client. Tests substitute an in-memory provider.
// =============================================================================

use std::future::Future;

use anyhow::Result;
use tracing::warn;

use crate::binance::BinanceClient;
use crate::market_data::{Candle, OrderBookSnapshot};
use crate::types::Timeframe;

/// Source of candles, order books and a liquidity ranking.
pub trait MarketDataProvider: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Symbols quoted in `quote_asset`, most liquid first, at most `limit`.
    fn list_symbols_by_volume(
        &self,
        quote_asset: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// The most recent `count` candles, oldest first.
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;

    /// Order book snapshot limited to `depth` levels per side.
    fn fetch_order_book(
        &self,
        symbol: &str,
        depth: usize,
    ) -> impl Future<Output = Result<OrderBookSnapshot>> + Send;
}

impl MarketDataProvider for BinanceClient {
    fn name(&self) -> &str {
        self.base_url()
    }

    async fn list_symbols_by_volume(&self, quote_asset: &str, limit: usize) -> Result<Vec<String>> {
        self.top_symbols_by_volume(quote_asset, limit).await
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>> {
        self.get_klines(symbol, timeframe, count).await
    }

    async fn fetch_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot> {
        self.get_depth(symbol, depth).await
    }
}

/// Tries `primary` first and repeats a failed call once on `secondary`.
#[derive(Debug, Clone)]
pub struct FallbackProvider<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackProvider<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P, S> MarketDataProvider for FallbackProvider<P, S>
where
    P: MarketDataProvider,
    S: MarketDataProvider,
{
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn list_symbols_by_volume(&self, quote_asset: &str, limit: usize) -> Result<Vec<String>> {
        match self.primary.list_symbols_by_volume(quote_asset, limit).await {
            Ok(symbols) => Ok(symbols),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "symbol listing failed on primary provider — falling back"
                );
                self.secondary.list_symbols_by_volume(quote_asset, limit).await
            }
        }
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>> {
        match self.primary.fetch_candles(symbol, timeframe, count).await {
            Ok(candles) => Ok(candles),
            Err(e) => {
                warn!(
                    symbol,
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "candle fetch failed on primary provider — falling back"
                );
                self.secondary.fetch_candles(symbol, timeframe, count).await
            }
        }
    }

    async fn fetch_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot> {
        match self.primary.fetch_order_book(symbol, depth).await {
            Ok(book) => Ok(book),
            Err(e) => {
                warn!(
                    symbol,
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "order book fetch failed on primary provider — falling back"
                );
                self.secondary.fetch_order_book(symbol, depth).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that either always fails or always serves one fixed answer.
    struct Stub {
        name: &'static str,
        healthy: bool,
        calls: AtomicUsize,
    }

    impl Stub {
        fn new(name: &'static str, healthy: bool) -> Self {
            Self {
                name,
                healthy,
                calls: AtomicUsize::new(0),
            }
        }

        fn answer<T>(&self, value: T) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(value)
            } else {
                anyhow::bail!("{} is down", self.name)
            }
        }
    }

    impl MarketDataProvider for Stub {
        fn name(&self) -> &str {
            self.name
        }

        async fn list_symbols_by_volume(&self, _quote: &str, _limit: usize) -> Result<Vec<String>> {
            self.answer(vec![self.name.to_string()])
        }

        async fn fetch_candles(&self, _symbol: &str, _tf: Timeframe, count: usize) -> Result<Vec<Candle>> {
            let candle = Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0, 0);
            self.answer(vec![candle; count])
        }

        async fn fetch_order_book(&self, _symbol: &str, _depth: usize) -> Result<OrderBookSnapshot> {
            self.answer(OrderBookSnapshot::default())
        }
    }

    #[tokio::test]
    async fn healthy_primary_is_used_alone() {
        let provider = FallbackProvider::new(Stub::new("primary", true), Stub::new("secondary", true));
        let symbols = provider.list_symbols_by_volume("USDT", 30).await.unwrap();
        assert_eq!(symbols, vec!["primary"]);
        assert_eq!(provider.secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_primary_falls_back() {
        let provider = FallbackProvider::new(Stub::new("primary", false), Stub::new("secondary", true));
        let symbols = provider.list_symbols_by_volume("USDT", 30).await.unwrap();
        assert_eq!(symbols, vec!["secondary"]);

        let candles = provider.fetch_candles("BTCUSDT", Timeframe::M15, 3).await.unwrap();
        assert_eq!(candles.len(), 3);
        assert!(provider.fetch_order_book("BTCUSDT", 10).await.is_ok());
        assert_eq!(provider.primary.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn both_failing_reports_secondary_error() {
        let provider = FallbackProvider::new(Stub::new("primary", false), Stub::new("secondary", false));
        let err = provider.fetch_order_book("BTCUSDT", 10).await.unwrap_err();
        assert!(err.to_string().contains("secondary"));
    }
}
