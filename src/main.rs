//! Perpetual-futures position manager.
//!
//! Opens on trend / mean-reversion signals, adds to winners up to a pyramid
//! ceiling, and exits on a stop-loss or a trailing giveback from the peak.

mod api;
mod config;
mod models;
mod scanner;
mod strategy;
mod trading;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{BinanceFuturesClient, DryRunExchange, Exchange};
use crate::config::Settings;
use crate::scanner::{EntryOutcome, Scanner};

/// Perpetual-futures pyramiding bot CLI.
#[derive(Parser)]
#[command(name = "perp-pyramid")]
#[command(about = "Leveraged perpetual-futures position manager with pyramiding and trailing exits", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scan loop
    Run {
        /// Seconds between scans (overrides SCAN_INTERVAL)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Run a single scan and exit
        #[arg(long)]
        once: bool,

        /// Log orders and closes instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show effective configuration
    Config,

    /// Show open positions across the symbol pool
    Positions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut settings = Settings::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Run { interval, once, dry_run } => {
            if let Some(secs) = interval {
                settings.scan_interval_secs = secs;
            }

            let client = build_client(&settings)?;
            let exchange: Arc<dyn Exchange> = if dry_run {
                Arc::new(DryRunExchange::new(client))
            } else {
                Arc::new(client)
            };

            info!(
                testnet = settings.testnet,
                dry_run,
                interval = settings.scan_interval_secs,
                pool = settings.symbol_pool.len(),
                "Starting perp-pyramid"
            );

            println!("\n=== Perp Pyramid ===");
            println!("Venue:         Binance USDT-M futures{}", if settings.testnet { " (testnet)" } else { "" });
            println!("Mode:          {}", if dry_run { "DRY RUN (no real orders)" } else { "LIVE TRADING" });
            println!("Scan interval: {}s", settings.scan_interval_secs);
            println!("Symbol pool:   {}", settings.symbol_pool.join(", "));

            let mut scanner = Scanner::new(exchange, &settings);

            if once {
                let report = scanner.scan_once().await;

                println!("\n--- Entries ---");
                for (symbol, outcome) in &report.entries {
                    let label = match outcome {
                        EntryOutcome::Skipped => "skipped".to_string(),
                        EntryOutcome::NoSignal => "no signal".to_string(),
                        EntryOutcome::Opened { pyramided } => {
                            format!("opened{}", if *pyramided { " + breakout add" } else { "" })
                        }
                        EntryOutcome::Failed => "failed".to_string(),
                    };
                    println!("  {:<14} {}", symbol, label);
                }

                println!("\n--- Monitoring ---");
                for (symbol, outcome) in &report.monitored {
                    println!("  {:<14} {:?}", symbol, outcome);
                }
                println!("\nScan took {:.1}s", report.elapsed.as_secs_f64());
            } else {
                println!("\nPress Ctrl+C to stop.\n");
                scanner.run().await;
            }
        }

        Commands::Config => {
            let risk = &settings.risk;
            let strategy = &settings.strategy;
            let screener = &settings.screener;

            println!("\n=== Exchange ===\n");
            println!("  Credentials:          {}", if settings.credentials.is_some() { "set" } else { "missing" });
            println!("  Testnet:              {}", settings.testnet);
            println!("  Max Concurrency:      {}", settings.max_concurrency);
            println!("  Scan Interval:        {}s", settings.scan_interval_secs);
            println!("  Symbol Pool:          {}", settings.symbol_pool.join(","));

            println!("\n=== Risk ===\n");
            println!("  Equity Ratio:         {}%", risk.equity_ratio * dec!(100));
            println!("  Leverage:             {}x", risk.leverage);
            println!("  Max Pyramid:          {}", risk.max_pyramid);
            println!("  Profit Add Threshold: {}%", risk.profit_add_threshold_pct * dec!(100));
            println!("  Trailing Giveback:    {}%", risk.trailing_giveback_pct * dec!(100));
            println!("  Max Loss:             {}%", risk.max_loss_pct * dec!(100));
            println!("  Order Max Retries:    {}", risk.order_max_retries);

            println!("\n=== Strategy ===\n");
            println!("  Klines:               {} x {}", strategy.kline_limit, strategy.kline_interval);
            println!(
                "  Trend EMA / MACD:     {} / {} / {}",
                strategy.trend_ema_fast, strategy.trend_ema_slow, strategy.macd_signal
            );
            println!(
                "  RSI:                  {} ({} / {})",
                strategy.rsi_period, strategy.rsi_oversold, strategy.rsi_overbought
            );
            println!("  Bollinger:            {} x {}", strategy.boll_window, strategy.boll_stddev);
            println!(
                "  Breakout Pyramid:     {} (lookback {})",
                strategy.breakout_enabled, strategy.breakout_lookback
            );

            println!("\n=== Screener ===\n");
            println!("  Min 24h Volume:       ${}", screener.min_quote_volume);
            println!("  Min Funding Rate:     {}", screener.min_funding_rate);
            println!("  Max Candidates:       {}", screener.max_candidates);
        }

        Commands::Positions => {
            let client = build_client(&settings)?;

            let equity = client.get_equity().await.context("Failed to fetch equity")?;
            let snapshots = join_all(settings.symbol_pool.iter().map(|s| client.get_position(s))).await;

            println!("\nEquity: ${:.2}", equity);
            println!(
                "\n{:<14} {:<6} {:>14} {:>14} {:>12} {:>9}",
                "SYMBOL", "SIDE", "AMOUNT", "ENTRY", "UPNL", "RATIO"
            );
            println!("{}", "-".repeat(74));

            let mut open = 0;
            for (symbol, result) in settings.symbol_pool.iter().zip(snapshots) {
                match result {
                    Ok(Some(p)) if !p.is_flat() => {
                        open += 1;
                        let ratio = p
                            .profit_ratio()
                            .map(|r| format!("{:.2}%", r * Decimal::from(100)))
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{:<14} {:<6} {:>14} {:>14} {:>12.2} {:>9}",
                            symbol,
                            p.side().map(|s| s.as_str()).unwrap_or("-"),
                            p.position_amount,
                            p.entry_price,
                            p.unrealized_profit,
                            ratio
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!(symbol = %symbol, error = %e, "Failed to fetch position"),
                }
            }

            if open == 0 {
                println!("No open positions in the symbol pool.");
            }
        }
    }

    Ok(())
}

fn build_client(settings: &Settings) -> Result<BinanceFuturesClient> {
    let credentials = settings.require_credentials()?;
    BinanceFuturesClient::new(credentials, settings.testnet, settings.max_concurrency)
        .context("Failed to build futures client")
}
