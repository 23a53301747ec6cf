//! Scan loop: shortlist, enter on signals, then supervise the whole pool.
//!
//! Each scan:
//! - shortlists candidates from the symbol pool
//! - per candidate (concurrently): sets leverage, asks the signal engine for a
//!   direction, opens, and adds one more order on a confirmed breakout
//! - runs the risk controller over every symbol in the pool
//!
//! The loop sleeps `max(1s, interval - elapsed)` between scans so a slow scan
//! delays the next one instead of overlapping it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::api::Exchange;
use crate::config::Settings;
use crate::models::{Side, Signal};
use crate::strategy::{shortlist, ScreenerConfig, SignalEngine};
use crate::trading::{MonitorOutcome, RiskController, RiskSlot, TradeExecutor};

const MIN_SLEEP: Duration = Duration::from_secs(1);

/// What the entry phase did for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Leverage could not be set; symbol skipped this scan
    Skipped,
    NoSignal,
    Opened { pyramided: bool },
    Failed,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub candidates: Vec<String>,
    pub entries: Vec<(String, EntryOutcome)>,
    pub monitored: Vec<(String, MonitorOutcome)>,
    pub elapsed: Duration,
}

pub struct Scanner<E: ?Sized> {
    controller: RiskController<E>,
    signals: Arc<SignalEngine>,
    symbol_pool: Vec<String>,
    screener: ScreenerConfig,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl<E: Exchange + ?Sized + 'static> Scanner<E> {
    pub fn new(exchange: Arc<E>, settings: &Settings) -> Self {
        Self {
            controller: RiskController::new(exchange, settings.risk.clone()),
            signals: Arc::new(SignalEngine::new(settings.strategy.clone())),
            symbol_pool: settings.symbol_pool.clone(),
            screener: settings.screener.clone(),
            interval: Duration::from_secs(settings.scan_interval_secs),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    #[cfg(test)]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[cfg(test)]
    pub fn controller(&self) -> &RiskController<E> {
        &self.controller
    }

    /// Ask the run loop to stop after the current scan.
    #[cfg(test)]
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Scan until Ctrl+C.
    pub async fn run(&mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            pool = self.symbol_pool.len(),
            "Starting scan loop"
        );

        let shutdown = self.shutdown.clone();
        let wake = self.wake.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                shutdown.store(true, Ordering::SeqCst);
                wake.notify_one();
            }
        });

        while !self.shutdown.load(Ordering::SeqCst) {
            let report = self.scan_once().await;

            let wait = self.interval.saturating_sub(report.elapsed).max(MIN_SLEEP);
            info!(elapsed_ms = report.elapsed.as_millis() as u64, wait_secs = wait.as_secs(), "Waiting for next scan");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.wake.notified() => {}
            }
        }

        info!(tracked = self.controller.tracker().len(), "Scan loop stopped");
    }

    /// One full scan. Never fails; per-symbol problems are logged and
    /// reported in the outcome lists.
    pub async fn scan_once(&mut self) -> ScanReport {
        let started = Instant::now();
        let exchange = self.controller.executor().exchange().clone();

        let candidates = shortlist(exchange.as_ref(), &self.symbol_pool, &self.screener).await;

        let signals = self.signals.clone();
        let entries = self
            .controller
            .fan_out(&candidates, move |executor, mut slot| {
                let signals = signals.clone();
                async move {
                    let outcome = manage_symbol(&executor, &signals, &mut slot).await;
                    (slot, outcome)
                }
            })
            .await;

        let monitored = self.controller.monitor_all(&self.symbol_pool).await;

        let report = ScanReport {
            candidates,
            entries,
            monitored,
            elapsed: started.elapsed(),
        };

        let opened = report
            .entries
            .iter()
            .filter(|(_, o)| matches!(o, EntryOutcome::Opened { .. }))
            .count();
        let closed = report
            .monitored
            .iter()
            .filter(|(_, o)| matches!(o, MonitorOutcome::Closed(_)))
            .count();
        info!(
            candidates = report.candidates.len(),
            opened,
            closed,
            tracked = self.controller.tracker().len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Scan complete"
        );
        report
    }
}

/// Entry pipeline for one candidate symbol.
async fn manage_symbol<E: Exchange + ?Sized>(
    executor: &TradeExecutor<E>,
    signals: &SignalEngine,
    slot: &mut RiskSlot,
) -> EntryOutcome {
    let symbol = slot.symbol().to_string();
    let exchange = executor.exchange();

    if let Err(e) = exchange.set_leverage(&symbol, executor.config().leverage).await {
        warn!(symbol = %symbol, error = %e, "Failed to set leverage, skipping");
        return EntryOutcome::Skipped;
    }

    let signal = signals.signal(exchange.as_ref(), &symbol).await;
    let Ok(side) = Side::try_from(signal) else {
        info!(symbol = %symbol, "No signal");
        return EntryOutcome::NoSignal;
    };

    if let Err(e) = executor.execute_trade(&symbol, signal).await {
        error!(symbol = %symbol, signal = %signal, error = %e, "Entry failed");
        return EntryOutcome::Failed;
    }

    let mut pyramided = false;
    if signals.should_pyramid(exchange.as_ref(), &symbol, side.is_long()).await {
        match executor.add_pyramid(Signal::from(side), slot).await {
            Ok(_) => pyramided = true,
            Err(e) => warn!(symbol = %symbol, error = %e, "Breakout pyramid not placed"),
        }
    }

    EntryOutcome::Opened { pyramided }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{candles_from_closes, MockExchange};
    use crate::api::ExchangeError;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn settings(pool: &str) -> Settings {
        let vars: HashMap<String, String> = [("SYMBOL_POOL", pool)]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_map(&vars).unwrap()
    }

    fn breakout_up() -> Vec<Decimal> {
        let mut v: Vec<Decimal> = (0..80).map(|i| dec!(100) + Decimal::from(i) / dec!(10)).collect();
        let last = *v.last().unwrap();
        v.extend((1..=10).map(|i| last + Decimal::from(i * i) / dec!(2)));
        v
    }

    fn outcome<T: Copy>(rows: &[(String, T)], symbol: &str) -> Option<T> {
        rows.iter().find(|(s, _)| s == symbol).map(|(_, o)| *o)
    }

    #[tokio::test]
    async fn test_scan_enters_pyramids_and_monitors() {
        let mock = Arc::new(MockExchange::new());
        for symbol in ["BTCUSDT", "ETHUSDT"] {
            mock.set_market_stats(symbol, dec!(5000000000), dec!(0.0001));
            mock.set_price(symbol, dec!(100));
        }
        mock.set_candles("BTCUSDT", candles_from_closes(&breakout_up()));
        mock.set_position("BTCUSDT", dec!(1), dec!(100), dec!(10));

        let mut scanner = Scanner::new(mock.clone(), &settings("BTCUSDT,ETHUSDT"));
        let report = scanner.scan_once().await;

        assert_eq!(report.candidates, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(outcome(&report.entries, "BTCUSDT"), Some(EntryOutcome::Opened { pyramided: true }));
        assert_eq!(outcome(&report.entries, "ETHUSDT"), Some(EntryOutcome::NoSignal));
        assert_eq!(outcome(&report.monitored, "BTCUSDT"), Some(MonitorOutcome::Held));
        assert_eq!(outcome(&report.monitored, "ETHUSDT"), Some(MonitorOutcome::Flat));

        assert_eq!(mock.leverage_for("BTCUSDT"), Some(30));
        assert_eq!(mock.opened().len(), 2);
        assert!(mock.opened().iter().all(|(s, side, _)| s == "BTCUSDT" && *side == Side::Long));

        let state = scanner.controller().tracker().get("BTCUSDT").unwrap();
        assert_eq!(state.pyramid_count, 1);
        assert_eq!(state.high_water_ratio, dec!(0.1));
        assert!(scanner.controller().tracker().get("ETHUSDT").is_none());
    }

    #[tokio::test]
    async fn test_failed_entry_skips_pyramid() {
        let mock = Arc::new(MockExchange::new());
        mock.set_price("BTCUSDT", dec!(100));
        mock.set_candles("BTCUSDT", candles_from_closes(&breakout_up()));
        mock.push_open_result(Err(ExchangeError::Rejected { code: -1121, message: "Invalid symbol.".into() }));

        let mut scanner = Scanner::new(mock.clone(), &settings("BTCUSDT"));
        let report = scanner.scan_once().await;

        assert_eq!(outcome(&report.entries, "BTCUSDT"), Some(EntryOutcome::Failed));
        assert_eq!(mock.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_leverage_failure_skips_symbol() {
        let mock = Arc::new(MockExchange::new());
        mock.set_price("ETHUSDT", dec!(100));
        mock.set_candles("BTCUSDT", candles_from_closes(&breakout_up()));
        mock.fail_reads_for("BTCUSDT");

        let mut scanner = Scanner::new(mock.clone(), &settings("BTCUSDT,ETHUSDT"));
        let report = scanner.scan_once().await;

        assert_eq!(outcome(&report.entries, "BTCUSDT"), Some(EntryOutcome::Skipped));
        assert_eq!(outcome(&report.monitored, "BTCUSDT"), Some(MonitorOutcome::Skipped));
        assert!(mock.opened().is_empty());
    }

    #[tokio::test]
    async fn test_stop_loss_during_scan() {
        let mock = Arc::new(MockExchange::new());
        mock.set_price("SOLUSDT", dec!(100));
        mock.set_position("SOLUSDT", dec!(-3), dec!(100), dec!(-120));

        let mut scanner = Scanner::new(mock.clone(), &settings("SOLUSDT"));
        let report = scanner.scan_once().await;

        assert!(matches!(outcome(&report.monitored, "SOLUSDT"), Some(MonitorOutcome::Closed(_))));
        assert_eq!(mock.close_count("SOLUSDT"), 1);
        assert!(scanner.controller().tracker().is_empty());
    }

    #[tokio::test]
    async fn test_stop_ends_run_loop() {
        let mock = Arc::new(MockExchange::new());
        let mut scanner = Scanner::new(mock, &settings("BTCUSDT")).with_interval(Duration::from_secs(3600));
        scanner.stop();

        // flag already set: the loop body never runs
        tokio::time::timeout(Duration::from_secs(5), scanner.run())
            .await
            .expect("run loop should exit");
    }
}
