//! Timer loop driving reconcile → analyze → execute.

use chrono::{Local, NaiveDate};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::execution::TradeExecutor;
use crate::strategy::MarketAnalyzer;

const MIN_INTERVAL: Duration = Duration::from_secs(60);
const STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Supplies the calendar day the daily trade cap is keyed by
pub type DateSource = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

fn local_date() -> NaiveDate {
    Local::now().date_naive()
}

/// Outcome of one analysis and trading cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Active trades found closed at the broker
    pub reconciled_closed: usize,
    pub signals: usize,
    /// Order ids placed this cycle
    pub executed: Vec<String>,
    pub duration: Duration,
}

struct CycleRunner {
    analyzer: MarketAnalyzer,
    executor: Arc<TradeExecutor>,
    today: DateSource,
    /// Day of the previous cycle
    last_day: Mutex<Option<NaiveDate>>,
}

impl CycleRunner {
    async fn run_cycle(&self) -> CycleReport {
        let started = std::time::Instant::now();
        tracing::info!(
            "🔄 Starting analysis cycle at {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let today = (self.today)();
        self.roll_over_day(today).await;

        let reconciled_closed = self.executor.reconcile().await;
        let signals = self.analyzer.analyze_markets().await;

        let executed = if signals.is_empty() {
            tracing::info!("No trades executed - no signals");
            Vec::new()
        } else {
            let executed = self.executor.execute_at(&signals, today).await;
            tracing::info!(
                "Executed {} trade(s), {} today",
                executed.len(),
                self.executor.trades_on(today).await
            );
            executed
        };

        let report = CycleReport {
            reconciled_closed,
            signals: signals.len(),
            executed,
            duration: started.elapsed(),
        };

        tracing::info!(
            "Analysis cycle completed in {:.2}s ({} closed, {} signal(s), {} executed)",
            report.duration.as_secs_f64(),
            report.reconciled_closed,
            report.signals,
            report.executed.len()
        );

        report
    }

    async fn roll_over_day(&self, today: NaiveDate) {
        let previous = self
            .last_day
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(today);

        if previous.is_some_and(|day| day != today) {
            self.executor.reset_daily_counter_at(today).await;
            tracing::info!("Daily trade counter reset for {}", today);
        }
    }
}

struct RunningLoop {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Runs trading cycles on a fixed interval in a background task
pub struct Scheduler {
    runner: Arc<CycleRunner>,
    interval: Duration,
    running: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    /// `interval` below one minute is raised to one minute
    pub fn new(analyzer: MarketAnalyzer, executor: Arc<TradeExecutor>, interval: Duration) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        tracing::info!("Scheduler initialized with interval: {:?}", interval);

        Self {
            runner: Arc::new(CycleRunner {
                analyzer,
                executor,
                today: Arc::new(local_date),
                last_day: Mutex::new(None),
            }),
            interval,
            running: Mutex::new(None),
        }
    }

    /// Key the daily cap by `today` instead of the local calendar date.
    ///
    /// Call before `start`; a running loop keeps its old source.
    pub fn with_date_source(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        let runner = CycleRunner {
            analyzer: self.runner.analyzer.clone(),
            executor: self.runner.executor.clone(),
            today: Arc::new(today),
            last_day: Mutex::new(None),
        };
        self.runner = Arc::new(runner);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn executor(&self) -> &Arc<TradeExecutor> {
        &self.runner.executor
    }

    /// Spawn the background loop; the first cycle runs immediately.
    ///
    /// Must be called from within a tokio runtime. Returns `false` (and does
    /// nothing) if the loop is already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());

        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            tracing::warn!("Scheduler is already running");
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(self.runner.clone(), self.interval, shutdown_rx));
        *running = Some(RunningLoop { handle, shutdown });

        tracing::info!("Scheduler started");
        true
    }

    /// Signal the loop to stop and wait briefly for it to finish.
    ///
    /// An in-flight cycle is not interrupted; if it outlasts the wait the
    /// loop exits on its own once the cycle ends. Returns `false` if the
    /// loop was not running.
    pub async fn stop(&self) -> bool {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let Some(RunningLoop { handle, shutdown }) = running else {
            tracing::warn!("Scheduler is not running");
            return false;
        };

        let _ = shutdown.send(true);

        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Scheduler task ended abnormally: {}", e),
            Err(_) => tracing::warn!(
                "Scheduler did not stop within {:?}, letting current cycle finish",
                STOP_TIMEOUT
            ),
        }

        tracing::info!("Scheduler stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Run one cycle on the caller's task
    pub async fn run_cycle(&self) -> CycleReport {
        self.runner.run_cycle().await
    }

    /// Run one cycle right away, outside the schedule, in its own task.
    ///
    /// Serialized against scheduled cycles by the executor's lock.
    pub fn run_now(&self) -> JoinHandle<CycleReport> {
        tracing::info!("Running immediate analysis cycle");
        let runner = self.runner.clone();
        tokio::spawn(async move { runner.run_cycle().await })
    }
}

async fn run_loop(runner: Arc<CycleRunner>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("Scheduler loop started");

    let mut ticker = interval_at(Instant::now(), interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        // Own task so a panicking cycle cannot take the loop down with it
        let cycle = runner.clone();
        match tokio::spawn(async move { cycle.run_cycle().await }).await {
            Ok(_) => {}
            Err(e) if e.is_panic() => tracing::error!("❌ Analysis cycle panicked: {}", e),
            Err(e) => tracing::error!("❌ Analysis cycle aborted: {}", e),
        }

        if *shutdown.borrow() {
            break;
        }
        tracing::info!("Next analysis in {} minute(s)", interval.as_secs() / 60);
    }

    tracing::info!("Scheduler loop stopped");
}
