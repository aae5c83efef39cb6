use anyhow::{Context, Result};
use clap::Parser;
use forexbot::api::credentials::API_KEY_ENV;
use forexbot::api::{AllCashClient, BrokerGateway, EnvTokenRefresher, TradingViewClient};
use forexbot::config::{BotConfig, DEFAULT_CONFIG_PATH};
use forexbot::execution::{ExecutorSettings, TradeExecutor};
use forexbot::logging::setup_logging;
use forexbot::scheduler::Scheduler;
use forexbot::strategy::{AnalyzerSettings, MarketAnalyzer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "forexbot")]
#[command(version, about = "RSI/EMA forex trading bot for the AllCash broker")]
struct Cli {
    /// Settings file (created with defaults if missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level, overrides the settings file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = BotConfig::load_or_init(&cli.config);

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let _log_guard = setup_logging(level, config.log_dir.as_deref().map(Path::new));

    tracing::info!("🚀 Forex bot starting");
    tracing::info!("Configuration loaded from {}", cli.config.display());

    let api_key = resolve_api_key(&config, &cli.config)?;

    // Broker
    let broker = AllCashClient::new(api_key)
        .with_base_url(&config.broker_base_url)
        .with_demo(config.demo_mode)
        .with_trade_duration(config.trade_duration_minutes)
        .with_refresher(Arc::new(EnvTokenRefresher::new().persist_to(&cli.config)));
    let broker: Arc<dyn BrokerGateway> = Arc::new(broker);
    tracing::info!("Broker API initialized. Demo mode: {}", config.demo_mode);

    log_account_summary(broker.as_ref()).await;

    // Analysis
    let indicators = TradingViewClient::with_rate_limit(
        config.ema_fast_period,
        config.ema_slow_period,
        config.indicator_requests_per_minute,
    );
    let analyzer = MarketAnalyzer::new(Arc::new(indicators), AnalyzerSettings::from(&config));

    let executor = Arc::new(TradeExecutor::new(broker, ExecutorSettings::from(&config)));
    let scheduler = Scheduler::new(analyzer, executor, config.schedule_interval());

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Pairs: {}", config.forex_pairs.join(", "));
    tracing::info!("  Interval: {}", config.interval());
    tracing::info!("  Trade amount: {:.2}", config.trade_amount);
    tracing::info!(
        "  TP/SL: {}/{} pips",
        config.take_profit_pips,
        config.stop_loss_pips
    );
    tracing::info!("  Max trades per day: {}", config.max_trades_per_day);

    if cli.once {
        let report = scheduler.run_cycle().await;
        println!(
            "Cycle finished in {:.2}s: {} closed, {} signal(s), {} order(s) placed",
            report.duration.as_secs_f64(),
            report.reconciled_closed,
            report.signals,
            report.executed.len()
        );
        for order_id in &report.executed {
            println!("  order {}", order_id);
        }
        println!(
            "Trades today: {}/{}",
            scheduler.executor().trades_today().await,
            config.max_trades_per_day
        );
        return Ok(());
    }

    scheduler.start();
    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");

    scheduler.stop().await;
    tracing::info!("👋 Forex bot stopped");
    Ok(())
}

/// Environment key wins over the stored one and is written back when they differ
fn resolve_api_key(config: &BotConfig, config_path: &Path) -> Result<String> {
    let from_env = std::env::var(API_KEY_ENV)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());

    let api_key = from_env
        .clone()
        .or_else(|| config.api_key.clone())
        .filter(|key| !key.is_empty())
        .with_context(|| {
            format!(
                "API key not found. Set {} or add api_key to {}",
                API_KEY_ENV,
                config_path.display()
            )
        })?;

    if from_env.is_some() && config.api_key.as_deref() != Some(api_key.as_str()) {
        BotConfig::update_api_key(config_path, &api_key)
            .with_context(|| format!("Failed to store API key in {}", config_path.display()))?;
    }

    Ok(api_key)
}

async fn log_account_summary(broker: &dyn BrokerGateway) {
    match broker.account_info().await {
        Ok(account) => tracing::info!(
            "💰 Account balance: {} {} (equity {})",
            account
                .balance
                .map(|b| format!("{:.2}", b))
                .unwrap_or_else(|| "n/a".to_string()),
            account.currency.as_deref().unwrap_or(""),
            account
                .equity
                .map(|e| format!("{:.2}", e))
                .unwrap_or_else(|| "n/a".to_string()),
        ),
        Err(e) => tracing::warn!("Failed to fetch account info: {}", e),
    }

    match broker.open_positions().await {
        Ok(positions) => tracing::info!("Open positions at broker: {}", positions.len()),
        Err(e) => tracing::warn!("Failed to fetch open positions: {}", e),
    }
}
