// =============================================================================
// Scanner: one scan cycle over a symbol universe
// =============================================================================
//
// Per symbol: candles -> series validation -> order book imbalance -> weekly
// momentum -> scoring engine. Symbols start no closer together than the
// configured pacing delay and at most `max_concurrency` run at once. A failed
// fetch skips that symbol only; the shutdown flag abandons the symbols not yet
// finished while keeping everything already collected.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ScannerConfig, SymbolSource};
use crate::market_data::{validate_series, weekly_momentum};
use crate::provider::MarketDataProvider;
use crate::scoring::{AbstainReason, ScoringEngine, TradeSetup, Verdict};
use crate::types::Timeframe;

/// The subset of [`ScannerConfig`] a scan cycle needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub symbol_source: SymbolSource,
    pub symbols: Vec<String>,
    pub quote_asset: String,
    pub top_n: usize,
    pub timeframe: Timeframe,
    pub candle_limit: usize,
    pub order_book_depth: usize,
    pub weekly_candle_limit: usize,
    pub drop_open_candle: bool,
    pub inter_symbol_delay: Duration,
    pub max_concurrency: usize,
}

impl From<&ScannerConfig> for ScanSettings {
    fn from(cfg: &ScannerConfig) -> Self {
        Self {
            symbol_source: cfg.symbol_source,
            symbols: cfg.symbols.clone(),
            quote_asset: cfg.quote_asset.clone(),
            top_n: cfg.top_n,
            timeframe: cfg.timeframe,
            candle_limit: cfg.candle_limit,
            order_book_depth: cfg.order_book_depth,
            weekly_candle_limit: cfg.weekly_candle_limit,
            drop_open_candle: cfg.drop_open_candle,
            inter_symbol_delay: cfg.inter_symbol_delay(),
            max_concurrency: cfg.max_concurrency,
        }
    }
}

// =============================================================================
// Request pacing
// =============================================================================

/// Hands out start slots at least `interval` apart, shared by all in-flight
/// symbols.
#[derive(Debug)]
pub struct RequestPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait for the next free slot. The first call returns immediately.
    pub async fn wait(&self) {
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

// =============================================================================
// Scan report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    pub setup: TradeSetup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutralSymbol {
    pub symbol: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstainedSymbol {
    pub symbol: String,
    pub reason: AbstainReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub error: String,
}

/// Everything one cycle produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub requested: usize,
    pub setups: Vec<ScanResult>,
    pub neutral: Vec<NeutralSymbol>,
    pub abstained: Vec<AbstainedSymbol>,
    pub skipped: Vec<SkippedSymbol>,
    /// Shutdown was requested before every symbol finished.
    pub cancelled: bool,
}

impl ScanReport {
    fn new(requested: usize) -> Self {
        let now = Utc::now();
        Self {
            cycle_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            requested,
            setups: Vec::new(),
            neutral: Vec::new(),
            abstained: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
        }
    }

    fn record(&mut self, symbol: String, outcome: Result<Verdict>) {
        match outcome {
            Ok(Verdict::Setup(setup)) => self.setups.push(ScanResult { symbol, setup }),
            Ok(Verdict::Neutral { score, .. }) => self.neutral.push(NeutralSymbol { symbol, score }),
            Ok(Verdict::Abstain(reason)) => {
                debug!(symbol = %symbol, reason = %reason, "engine abstained");
                self.abstained.push(AbstainedSymbol { symbol, reason });
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %format!("{e:#}"), "symbol skipped");
                self.skipped.push(SkippedSymbol {
                    symbol,
                    error: format!("{e:#}"),
                });
            }
        }
    }

    /// Symbols that reached a verdict or failed.
    pub fn scanned(&self) -> usize {
        self.setups.len() + self.neutral.len() + self.abstained.len() + self.skipped.len()
    }

    /// Setups ordered by ADX, strongest trend first.
    pub fn ranked_by_adx(&self) -> Vec<&ScanResult> {
        let mut ranked: Vec<&ScanResult> = self.setups.iter().collect();
        ranked.sort_by(|a, b| b.setup.adx.total_cmp(&a.setup.adx));
        ranked
    }

    pub fn log_summary(&self) {
        info!(
            cycle_id = %self.cycle_id,
            requested = self.requested,
            scanned = self.scanned(),
            setups = self.setups.len(),
            neutral = self.neutral.len(),
            abstained = self.abstained.len(),
            skipped = self.skipped.len(),
            cancelled = self.cancelled,
            elapsed_ms = (self.finished_at - self.started_at).num_milliseconds(),
            "scan cycle complete"
        );
    }
}

// =============================================================================
// Scanner
// =============================================================================

/// Runs scan cycles against an injected [`MarketDataProvider`].
pub struct Scanner<P> {
    provider: P,
    engine: ScoringEngine,
    settings: ScanSettings,
    pacer: RequestPacer,
}

impl<P: MarketDataProvider> Scanner<P> {
    pub fn new(provider: P, engine: ScoringEngine, settings: ScanSettings) -> Self {
        let pacer = RequestPacer::new(settings.inter_symbol_delay);
        Self {
            provider,
            engine,
            settings,
            pacer,
        }
    }

    /// The universe for the next cycle.
    pub async fn resolve_symbols(&self) -> Result<Vec<String>> {
        match self.settings.symbol_source {
            SymbolSource::Fixed => Ok(self.settings.symbols.clone()),
            SymbolSource::TopByVolume => {
                let symbols = self
                    .provider
                    .list_symbols_by_volume(&self.settings.quote_asset, self.settings.top_n)
                    .await
                    .with_context(|| {
                        format!("failed to list {} symbols by volume", self.settings.quote_asset)
                    })?;
                info!(
                    provider = self.provider.name(),
                    count = symbols.len(),
                    "symbol universe resolved by volume"
                );
                Ok(symbols)
            }
        }
    }

    /// Scan `symbols`, stopping early once `shutdown` turns true.
    pub async fn run_cycle(&self, symbols: &[String], shutdown: &watch::Receiver<bool>) -> ScanReport {
        let mut report = ScanReport::new(symbols.len());
        let mut shutdown = shutdown.clone();
        let mut watching = true;

        info!(
            cycle_id = %report.cycle_id,
            symbols = symbols.len(),
            timeframe = %self.settings.timeframe,
            policy = ?self.engine.config().policy,
            "scan cycle started"
        );

        let mut outcomes = stream::iter(symbols.iter().cloned())
            .map(|symbol| async move {
                let outcome = self.scan_symbol(&symbol).await;
                (symbol, outcome)
            })
            .buffer_unordered(self.settings.max_concurrency.max(1));

        loop {
            if *shutdown.borrow() {
                report.cancelled = report.scanned() < report.requested;
                break;
            }
            tokio::select! {
                biased;
                next = outcomes.next() => match next {
                    Some((symbol, outcome)) => report.record(symbol, outcome),
                    None => break,
                },
                changed = shutdown.changed(), if watching => {
                    if changed.is_err() {
                        // Sender gone: nobody can request shutdown any more.
                        watching = false;
                    }
                }
            }
        }

        if report.cancelled {
            warn!(
                cycle_id = %report.cycle_id,
                scanned = report.scanned(),
                requested = report.requested,
                "scan cycle cancelled by shutdown"
            );
        }

        report.finished_at = Utc::now();
        report
    }

    async fn scan_symbol(&self, symbol: &str) -> Result<Verdict> {
        self.pacer.wait().await;
        let settings = &self.settings;

        let mut candles = self
            .provider
            .fetch_candles(symbol, settings.timeframe, settings.candle_limit)
            .await
            .context("candle fetch failed")?;

        let now_ms = Utc::now().timestamp_millis();
        if settings.drop_open_candle && candles.last().is_some_and(|c| !c.is_closed_at(now_ms)) {
            candles.pop();
        }
        validate_series(symbol, &candles)?;

        let need = self.engine.required_warmup();
        if candles.len() < need {
            return Ok(Verdict::Abstain(AbstainReason::InsufficientData {
                have: candles.len(),
                need,
            }));
        }

        let book = self
            .provider
            .fetch_order_book(symbol, settings.order_book_depth)
            .await
            .context("order book fetch failed")?;
        let imbalance = book.imbalance(settings.order_book_depth);

        let weekly_candles = self
            .provider
            .fetch_candles(symbol, Timeframe::W1, settings.weekly_candle_limit)
            .await
            .context("weekly candle fetch failed")?;
        let weekly = weekly_momentum(&weekly_candles, now_ms);

        let verdict = self.engine.evaluate(&candles, imbalance, weekly);
        debug!(
            symbol,
            candles = candles.len(),
            imbalance = format!("{imbalance:.2}"),
            weekly = %weekly,
            score = ?verdict.score(),
            "symbol scored"
        );
        Ok(verdict)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::market_data::{BookLevel, Candle, OrderBookSnapshot};
    use crate::scoring::ScoringConfig;
    use crate::types::{Direction, WeeklyMomentum};

    const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                let t = i as i64 * 900_000;
                Candle::new(t, open, close + 1.0, close - 1.0, close, 50.0, t + 899_999)
            })
            .collect()
    }

    fn pullback_series() -> Vec<Candle> {
        let mut closes: Vec<f64> = (0..250).map(|i| 100.0 + i as f64).collect();
        closes.extend((1..=15).map(|k| 349.0 - 2.0 * k as f64));
        candles_from_closes(&closes)
    }

    /// Long rise, an 11-candle pullback, then a partial recovery.
    fn resumed_uptrend() -> Vec<Candle> {
        let mut closes: Vec<f64> = (0..260).map(|i| 100.0 + i as f64).collect();
        closes.extend((1..=11).map(|k| 359.0 - 2.0 * k as f64));
        closes.extend((1..=9).map(|k| 337.0 + k as f64));
        candles_from_closes(&closes)
    }

    fn rising_weeks() -> Vec<Candle> {
        (0..3)
            .map(|i| {
                let close = 100.0 + 10.0 * i as f64;
                let t = i * WEEK_MS;
                Candle::new(t, close, close, close, close, 1.0, t + WEEK_MS - 1)
            })
            .collect()
    }

    /// In-memory provider keyed by symbol; unknown symbols fail.
    #[derive(Default)]
    struct FakeProvider {
        series: HashMap<String, Vec<Candle>>,
        ranking: Vec<String>,
        book_calls: AtomicUsize,
        shutdown_after_first: Option<watch::Sender<bool>>,
    }

    impl FakeProvider {
        fn with(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
            self.series.insert(symbol.to_string(), candles);
            self
        }
    }

    impl MarketDataProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn list_symbols_by_volume(&self, _quote: &str, limit: usize) -> Result<Vec<String>> {
            Ok(self.ranking.iter().take(limit).cloned().collect())
        }

        async fn fetch_candles(&self, symbol: &str, timeframe: Timeframe, _count: usize) -> Result<Vec<Candle>> {
            if let Some(tx) = &self.shutdown_after_first {
                tx.send_replace(true);
            }
            let series = self
                .series
                .get(symbol)
                .with_context(|| format!("unknown symbol {symbol}"))?;
            Ok(match timeframe {
                Timeframe::W1 => rising_weeks(),
                _ => series.clone(),
            })
        }

        async fn fetch_order_book(&self, _symbol: &str, _depth: usize) -> Result<OrderBookSnapshot> {
            self.book_calls.fetch_add(1, Ordering::SeqCst);
            Ok(OrderBookSnapshot::new(
                vec![BookLevel { price: 99.0, quantity: 3.0 }],
                vec![BookLevel { price: 101.0, quantity: 1.0 }],
            ))
        }
    }

    fn settings(symbols: &[&str]) -> ScanSettings {
        ScanSettings {
            symbol_source: SymbolSource::Fixed,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            inter_symbol_delay: Duration::ZERO,
            ..ScanSettings::from(&ScannerConfig::default())
        }
    }

    fn scanner(provider: FakeProvider, symbols: &[&str]) -> Scanner<FakeProvider> {
        let engine = ScoringEngine::new(ScoringConfig::two_factor()).unwrap();
        Scanner::new(provider, engine, settings(symbols))
    }

    fn owned(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn cycle_sorts_symbols_into_outcomes() {
        let provider = FakeProvider::default()
            .with("PULLUSDT", pullback_series())
            .with("FLATUSDT", candles_from_closes(&vec![100.0; 260]))
            .with("NEWUSDT", candles_from_closes(&vec![100.0; 50]));
        let symbols = ["PULLUSDT", "FLATUSDT", "NEWUSDT", "GONEUSDT"];
        let scanner = scanner(provider, &symbols);
        let (_tx, rx) = watch::channel(false);

        let report = scanner.run_cycle(&owned(&symbols), &rx).await;

        assert!(!report.cancelled);
        assert_eq!(report.requested, 4);
        assert_eq!(report.scanned(), 4);

        assert_eq!(report.setups.len(), 1);
        let result = &report.setups[0];
        assert_eq!(result.symbol, "PULLUSDT");
        assert_eq!(result.setup.direction, Direction::Long);
        assert_eq!(result.setup.weekly_momentum, WeeklyMomentum::Bullish);
        assert_eq!(result.setup.imbalance, 50.0);

        assert_eq!(report.neutral.len(), 1);
        assert_eq!(report.neutral[0].symbol, "FLATUSDT");

        assert_eq!(
            report.abstained,
            vec![AbstainedSymbol {
                symbol: "NEWUSDT".to_string(),
                reason: AbstainReason::InsufficientData { have: 50, need: 200 },
            }]
        );

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].symbol, "GONEUSDT");
        assert!(report.skipped[0].error.contains("unknown symbol"));
    }

    #[tokio::test]
    async fn short_series_skips_the_order_book() {
        let provider = FakeProvider::default().with("NEWUSDT", candles_from_closes(&vec![100.0; 50]));
        let scanner = scanner(provider, &["NEWUSDT"]);
        let (_tx, rx) = watch::channel(false);

        scanner.run_cycle(&owned(&["NEWUSDT"]), &rx).await;
        assert_eq!(scanner.provider.book_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_series_is_skipped() {
        let mut candles = candles_from_closes(&vec![100.0; 260]);
        candles.swap(10, 11);
        let provider = FakeProvider::default().with("BADUSDT", candles);
        let scanner = scanner(provider, &["BADUSDT"]);
        let (_tx, rx) = watch::channel(false);

        let report = scanner.run_cycle(&owned(&["BADUSDT"]), &rx).await;
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].error.contains("out of order"));
    }

    #[tokio::test]
    async fn shutdown_before_start_scans_nothing() {
        let provider = FakeProvider::default().with("PULLUSDT", pullback_series());
        let scanner = scanner(provider, &["PULLUSDT"]);
        let (_tx, rx) = watch::channel(true);

        let report = scanner.run_cycle(&owned(&["PULLUSDT"]), &rx).await;
        assert!(report.cancelled);
        assert_eq!(report.scanned(), 0);
    }

    #[tokio::test]
    async fn shutdown_mid_cycle_keeps_collected_results() {
        let (tx, rx) = watch::channel(false);
        let provider = FakeProvider {
            shutdown_after_first: Some(tx),
            ..FakeProvider::default()
        }
        .with("PULLUSDT", pullback_series())
        .with("FLATUSDT", candles_from_closes(&vec![100.0; 260]));
        let symbols = ["PULLUSDT", "FLATUSDT"];
        let scanner = scanner(provider, &symbols);

        let report = scanner.run_cycle(&owned(&symbols), &rx).await;
        assert!(report.cancelled);
        assert_eq!(report.scanned(), 1);
        assert_eq!(report.setups.len(), 1);
        assert_eq!(report.setups[0].symbol, "PULLUSDT");
    }

    #[tokio::test]
    async fn dropped_sender_does_not_stop_the_cycle() {
        let provider = FakeProvider::default()
            .with("PULLUSDT", pullback_series())
            .with("FLATUSDT", candles_from_closes(&vec![100.0; 260]));
        let symbols = ["PULLUSDT", "FLATUSDT"];
        let scanner = scanner(provider, &symbols);
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let report = scanner.run_cycle(&owned(&symbols), &rx).await;
        assert!(!report.cancelled);
        assert_eq!(report.scanned(), 2);
    }

    #[tokio::test]
    async fn bounded_concurrency_scans_everything() {
        let mut provider = FakeProvider::default();
        let symbols: Vec<String> = (0..8).map(|i| format!("S{i}USDT")).collect();
        for symbol in &symbols {
            provider = provider.with(symbol, pullback_series());
        }
        let engine = ScoringEngine::new(ScoringConfig::two_factor()).unwrap();
        let scanner = Scanner::new(
            provider,
            engine,
            ScanSettings {
                max_concurrency: 4,
                ..settings(&[])
            },
        );
        let (_tx, rx) = watch::channel(false);

        let report = scanner.run_cycle(&symbols, &rx).await;
        assert_eq!(report.setups.len(), 8);
    }

    #[tokio::test]
    async fn default_policy_cycle_reports_long_setup() {
        let provider = FakeProvider::default()
            .with("TRENDUSDT", resumed_uptrend())
            .with("FLATUSDT", candles_from_closes(&vec![100.0; 260]));
        let symbols = ["TRENDUSDT", "FLATUSDT"];
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let scanner = Scanner::new(provider, engine, settings(&symbols));
        let (_tx, rx) = watch::channel(false);

        let report = scanner.run_cycle(&owned(&symbols), &rx).await;

        assert_eq!(report.scanned(), 2);
        assert!(report.skipped.is_empty());
        assert_eq!(report.setups.len(), 1);
        let result = &report.setups[0];
        assert_eq!(result.symbol, "TRENDUSDT");
        assert_eq!(result.setup.direction, Direction::Long);
        assert!((result.setup.score - 3.5).abs() < 1e-9);
        assert_eq!(result.setup.entry_price, 346.0);
        assert_eq!(result.setup.weekly_momentum, WeeklyMomentum::Bullish);
        assert_eq!(result.setup.imbalance, 50.0);

        assert_eq!(report.neutral.len(), 1);
        assert_eq!(report.neutral[0].symbol, "FLATUSDT");
    }

    #[tokio::test]
    async fn resolves_universe_from_source() {
        let provider = FakeProvider {
            ranking: owned(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]),
            ..FakeProvider::default()
        };
        let engine = ScoringEngine::new(ScoringConfig::default()).unwrap();
        let scanner = Scanner::new(
            provider,
            engine,
            ScanSettings {
                symbol_source: SymbolSource::TopByVolume,
                top_n: 2,
                ..settings(&["XRPUSDT"])
            },
        );
        assert_eq!(scanner.resolve_symbols().await.unwrap(), vec!["BTCUSDT", "ETHUSDT"]);

        let fixed = Scanner::new(
            FakeProvider::default(),
            ScoringEngine::new(ScoringConfig::default()).unwrap(),
            settings(&["XRPUSDT"]),
        );
        assert_eq!(fixed.resolve_symbols().await.unwrap(), vec!["XRPUSDT"]);
    }

    #[tokio::test]
    async fn pacer_spaces_out_starts() {
        let pacer = RequestPacer::new(Duration::from_millis(30));
        let started = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn ranking_orders_by_adx_descending() {
        let setup = |adx: f64| TradeSetup {
            direction: Direction::Long,
            entry_price: 100.0,
            stop_loss: 96.0,
            take_profit: 108.0,
            score: 4.0,
            adx,
            rsi: 35.0,
            atr: 2.0,
            imbalance: 0.0,
            weekly_momentum: WeeklyMomentum::Bullish,
            factors: Vec::new(),
        };
        let mut report = ScanReport::new(3);
        for (symbol, adx) in [("A", 22.0), ("B", 41.0), ("C", 30.5)] {
            report.record(symbol.to_string(), Ok(Verdict::Setup(setup(adx))));
        }
        let order: Vec<&str> = report.ranked_by_adx().iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);
    }
}
