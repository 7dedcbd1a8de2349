// =============================================================================
// Signal Scanner: Main Entry Point
// =============================================================================
//
// Loads the scanner config, builds the exchange client(s) and runs scan
// cycles on a fixed interval until Ctrl+C. Setups are logged ranked by ADX.
// =============================================================================

use std::path::PathBuf;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use signal_scanner::binance::BinanceClient;
use signal_scanner::config::{ScannerConfig, DEFAULT_CONFIG_PATH};
use signal_scanner::provider::{FallbackProvider, MarketDataProvider};
use signal_scanner::scanner::{ScanReport, ScanSettings, Scanner};
use signal_scanner::scoring::ScoringEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Signal Scanner — starting up");

    let config_path = std::env::var("SCANNER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = ScannerConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let defaults = ScannerConfig::default();
        if !config_path.exists() {
            // Leave an editable template behind.
            if let Err(e) = defaults.save(&config_path) {
                error!(error = %e, "Failed to write default config");
            }
        }
        defaults
    });
    config.apply_env_overrides();

    // Configuration errors are the only fatal ones.
    config.validate()?;
    let engine = ScoringEngine::new(config.scoring.clone())?;

    let oneshot = std::env::var("SCANNER_ONESHOT")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    info!(
        symbol_source = ?config.symbol_source,
        timeframe = %config.timeframe,
        policy = ?config.scoring.policy,
        warmup = engine.required_warmup(),
        max_concurrency = config.max_concurrency,
        oneshot,
        "Scanner configured"
    );

    // ── 2. Shutdown channel ──────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received — finishing current symbol");
            shutdown_tx.send_replace(true);
        }
    });

    // ── 3. Providers & scan loop ─────────────────────────────────────────
    let primary = BinanceClient::new(&config.base_url, config.request_timeout())?;
    match config.fallback_base_url.clone() {
        Some(url) => {
            let secondary = BinanceClient::new(url, config.request_timeout())?;
            info!(primary = primary.base_url(), secondary = secondary.base_url(), "Fallback provider enabled");
            let provider = FallbackProvider::new(primary, secondary);
            run(provider, engine, &config, oneshot, shutdown_rx).await;
        }
        None => run(primary, engine, &config, oneshot, shutdown_rx).await,
    }

    info!("Signal Scanner shut down complete.");
    Ok(())
}

async fn run<P: MarketDataProvider>(
    provider: P,
    engine: ScoringEngine,
    config: &ScannerConfig,
    oneshot: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    let scanner = Scanner::new(provider, engine, ScanSettings::from(config));
    let mut interval = tokio::time::interval(config.refresh_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Signal handler is gone; keep the cadence.
                    interval.tick().await;
                }
            }
        }
        if *shutdown.borrow() {
            break;
        }

        let symbols = match scanner.resolve_symbols().await {
            Ok(symbols) => symbols,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to resolve symbols — retrying next cycle");
                if oneshot {
                    break;
                }
                continue;
            }
        };

        let report = scanner.run_cycle(&symbols, &shutdown).await;
        log_report(&report);

        if oneshot || report.cancelled {
            break;
        }
    }
}

fn log_report(report: &ScanReport) {
    for (rank, result) in report.ranked_by_adx().into_iter().enumerate() {
        let s = &result.setup;
        info!(
            rank = rank + 1,
            symbol = %result.symbol,
            direction = %s.direction,
            entry = s.entry_price,
            stop = s.stop_loss,
            target = s.take_profit,
            score = s.score,
            adx = format!("{:.2}", s.adx),
            rsi = format!("{:.2}", s.rsi),
            imbalance = format!("{:.2}", s.imbalance),
            weekly = %s.weekly_momentum,
            "SETUP"
        );
    }
    report.log_summary();
}
