mod common;

use chrono::NaiveDate;
use common::{FakeBroker, FakeIndicators};
use forexbot::execution::{ExecutorSettings, TradeExecutor};
use forexbot::models::{AnalysisInterval, IndicatorReadings, Instrument, OrderState};
use forexbot::scheduler::Scheduler;
use forexbot::strategy::{AnalyzerSettings, MarketAnalyzer, SignalThresholds};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn analyzer(pairs: &[&str], indicators: Arc<FakeIndicators>) -> MarketAnalyzer {
    MarketAnalyzer::new(
        indicators,
        AnalyzerSettings {
            instruments: pairs.iter().map(|p| Instrument::new(p)).collect(),
            interval: AnalysisInterval::OneHour,
            thresholds: SignalThresholds::default(),
            delay: Duration::ZERO,
        },
    )
}

fn scheduler(
    pairs: &[&str],
    indicators: Arc<FakeIndicators>,
    broker: Arc<FakeBroker>,
    max_trades_per_day: u32,
) -> Scheduler {
    let executor = Arc::new(TradeExecutor::new(
        broker,
        ExecutorSettings {
            max_trades_per_day,
            ..ExecutorSettings::default()
        },
    ));
    Scheduler::new(analyzer(pairs, indicators), executor, Duration::from_secs(60))
}

#[tokio::test]
async fn test_cycle_analyzes_and_executes() {
    let no_close = IndicatorReadings {
        rsi: Some(10.0),
        ema_fast: Some(1.2),
        ema_slow: Some(1.0),
        close: None,
    };

    let indicators = Arc::new(
        FakeIndicators::default()
            // BUY, both indicators agree
            .with("EUR/USD", 15.0, 1.12, 1.10, 1.1105)
            // SELL, strength 0.4 after disagreement penalty: not actionable
            .with("GBP/USD", 75.0, 1.2701, 1.27, 1.2700)
            // neutral
            .with("USD/CHF", 50.0, 0.9, 0.9, 0.9)
            .with_readings("USD/CAD", no_close),
    );
    let broker = Arc::new(FakeBroker::default());
    let scheduler = scheduler(
        &["EUR/USD", "GBP/USD", "USD/CHF", "USD/CAD", "USD/JPY"],
        indicators.clone(),
        broker.clone(),
        5,
    );

    let report = scheduler.run_cycle().await;

    assert_eq!(report.reconciled_closed, 0);
    assert_eq!(report.signals, 2);
    assert_eq!(report.executed, vec!["EURUSD-1"]);
    assert_eq!(broker.placed_symbols(), vec!["EUR/USD"]);

    // Every instrument was attempted despite the failures
    assert_eq!(indicators.calls.lock().unwrap().len(), 5);
}

#[tokio::test]
async fn test_cycle_reconciles_before_analysis() {
    let indicators = Arc::new(FakeIndicators::default().with("EUR/USD", 15.0, 1.12, 1.10, 1.11));
    let broker = Arc::new(FakeBroker::default());
    let scheduler = scheduler(&["EUR/USD"], indicators, broker.clone(), 5);

    let first = scheduler.run_cycle().await;
    assert_eq!(first.executed, vec!["EURUSD-1"]);

    // Still open: the same instrument is not traded again
    let second = scheduler.run_cycle().await;
    assert!(second.executed.is_empty());

    broker.set_state("EURUSD-1", OrderState::Closed);
    let third = scheduler.run_cycle().await;
    assert_eq!(third.reconciled_closed, 1);
    assert_eq!(third.executed, vec!["EURUSD-2"]);
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let indicators = Arc::new(FakeIndicators::default().with("EUR/USD", 15.0, 1.12, 1.10, 1.11));
    let broker = Arc::new(FakeBroker::default());
    let scheduler = scheduler(&["EUR/USD"], indicators, broker.clone(), 5);

    assert!(!scheduler.stop().await);
    assert!(!scheduler.is_running());

    assert!(scheduler.start());
    assert!(!scheduler.start());
    assert!(scheduler.is_running());

    // The first cycle runs immediately
    let mut waited = Duration::ZERO;
    while broker.placed_symbols().is_empty() && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert_eq!(broker.placed_symbols(), vec!["EUR/USD"]);

    assert!(scheduler.stop().await);
    assert!(!scheduler.is_running());
    assert!(!scheduler.stop().await);

    // Restart after stop
    assert!(scheduler.start());
    assert!(scheduler.stop().await);
}

#[tokio::test]
async fn test_stop_interrupts_idle_wait_promptly() {
    let indicators = Arc::new(FakeIndicators::default());
    let broker = Arc::new(FakeBroker::default());
    let scheduler = scheduler(&["EUR/USD"], indicators, broker, 5);

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    assert!(scheduler.stop().await);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_run_now_outside_schedule() {
    let indicators = Arc::new(FakeIndicators::default().with("USD/JPY", 80.0, 149.0, 150.0, 149.5));
    let broker = Arc::new(FakeBroker::default());
    let scheduler = scheduler(&["USD/JPY"], indicators, broker.clone(), 5);

    let report = scheduler.run_now().await.unwrap();

    assert_eq!(report.executed, vec!["USDJPY-1"]);
    let placed = broker.placed.lock().unwrap();
    // SELL at 149.5 with JPY pips: TP 20 pips below, SL 10 pips above
    assert!((placed[0].take_profit.unwrap() - 149.3).abs() < 1e-9);
    assert!((placed[0].stop_loss.unwrap() - 149.6).abs() < 1e-9);
}

#[tokio::test]
async fn test_interval_floor_is_one_minute() {
    let scheduler = Scheduler::new(
        analyzer(&[], Arc::new(FakeIndicators::default())),
        Arc::new(TradeExecutor::new(
            Arc::new(FakeBroker::default()),
            ExecutorSettings::default(),
        )),
        Duration::from_secs(5),
    );

    assert_eq!(scheduler.interval(), Duration::from_secs(60));
}

#[tokio::test]
async fn test_panicking_cycle_keeps_loop_alive() {
    let indicators = Arc::new(FakeIndicators::default().with("EUR/USD", 15.0, 1.12, 1.10, 1.11));
    let mut broker = FakeBroker::default();
    broker.panic_symbols.insert("EUR/USD".to_string());
    let broker = Arc::new(broker);
    let scheduler = scheduler(&["EUR/USD"], indicators.clone(), broker, 5);

    assert!(scheduler.start());

    let mut waited = Duration::ZERO;
    while indicators.calls.lock().unwrap().is_empty() && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(indicators.calls.lock().unwrap().len(), 1);
    assert!(scheduler.is_running());

    // The executor lock was released by the unwinding cycle
    assert!(scheduler.executor().active_trades().await.is_empty());
    assert!(scheduler.stop().await);
}

#[tokio::test]
async fn test_day_rollover_lifts_daily_cap() {
    let day = Arc::new(Mutex::new(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()));
    let indicators = Arc::new(
        FakeIndicators::default()
            // BUY, strength 0.71
            .with("EUR/USD", 15.0, 1.12, 1.10, 1.11)
            // BUY, strength 0.59
            .with("GBP/USD", 22.0, 1.12, 1.10, 1.27),
    );
    let broker = Arc::new(FakeBroker::default());
    let scheduler = scheduler(&["EUR/USD", "GBP/USD"], indicators, broker.clone(), 1)
        .with_date_source({
            let day = day.clone();
            move || *day.lock().unwrap()
        });

    let first = scheduler.run_cycle().await;
    assert_eq!(first.executed, vec!["EURUSD-1"]);

    // Cap of one reached for the day
    let second = scheduler.run_cycle().await;
    assert_eq!(second.signals, 2);
    assert!(second.executed.is_empty());

    let monday = *day.lock().unwrap();
    let tuesday = monday.succ_opt().unwrap();
    *day.lock().unwrap() = tuesday;

    let third = scheduler.run_cycle().await;
    assert_eq!(third.executed, vec!["GBPUSD-2"]);
    assert_eq!(broker.placed_symbols(), vec!["EUR/USD", "GBP/USD"]);
    assert_eq!(scheduler.executor().trades_on(monday).await, 0);
    assert_eq!(scheduler.executor().trades_on(tuesday).await, 1);
}
