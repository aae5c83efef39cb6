use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::BrokerGateway;
use crate::config::BotConfig;
use crate::error::BrokerError;
use crate::models::{Instrument, OrderRequest, Signal, TradeSide};
use crate::risk::DailyTradeCounter;

/// Order sizing and daily limits
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    pub trade_amount: f64,
    pub take_profit_pips: u32,
    pub stop_loss_pips: u32,
    pub max_trades_per_day: u32,
    pub demo: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&BotConfig::default())
    }
}

impl From<&BotConfig> for ExecutorSettings {
    fn from(config: &BotConfig) -> Self {
        Self {
            trade_amount: config.trade_amount,
            take_profit_pips: config.take_profit_pips,
            stop_loss_pips: config.stop_loss_pips,
            max_trades_per_day: config.max_trades_per_day,
            demo: config.demo_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    Place { side: TradeSide },
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

/// Absolute take-profit and stop-loss prices for an entry
pub fn protective_levels(
    side: TradeSide,
    price: f64,
    pip: f64,
    take_profit_pips: u32,
    stop_loss_pips: u32,
) -> (f64, f64) {
    let tp_offset = f64::from(take_profit_pips) * pip;
    let sl_offset = f64::from(stop_loss_pips) * pip;

    match side {
        TradeSide::Buy => (price + tp_offset, price - sl_offset),
        TradeSide::Sell => (price - tp_offset, price + sl_offset),
    }
}

#[derive(Debug, Default)]
struct ExecutorState {
    /// instrument -> broker order id; at most one per instrument
    active_trades: HashMap<String, String>,
    daily_trades: DailyTradeCounter,
}

/// Places orders for actionable signals and tracks them until the broker closes them.
///
/// All state lives behind one async mutex that stays held across broker calls,
/// so concurrent `execute`/`close`/`reconcile` calls serialize.
pub struct TradeExecutor {
    broker: Arc<dyn BrokerGateway>,
    settings: ExecutorSettings,
    state: Mutex<ExecutorState>,
}

impl TradeExecutor {
    pub fn new(broker: Arc<dyn BrokerGateway>, settings: ExecutorSettings) -> Self {
        Self {
            broker,
            settings,
            state: Mutex::new(ExecutorState::default()),
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Place orders for the strongest actionable signals within today's budget.
    ///
    /// # Returns
    /// Order ids accepted by the broker, strongest signal first
    pub async fn execute(&self, signals: &[Signal]) -> Vec<String> {
        self.execute_at(signals, Local::now().date_naive()).await
    }

    pub async fn execute_at(&self, signals: &[Signal], today: NaiveDate) -> Vec<String> {
        let mut state = self.state.lock().await;
        let max = self.settings.max_trades_per_day;

        let budget = state.daily_trades.remaining(today, max);
        if budget == 0 {
            tracing::info!(
                "Daily trade limit reached ({}/{}), not executing {} signal(s)",
                state.daily_trades.count_for(today),
                max,
                signals.len()
            );
            return Vec::new();
        }

        let mut ranked: Vec<&Signal> = signals.iter().collect();
        ranked.sort_by(|a, b| b.strength.total_cmp(&a.strength));

        let mut placed = Vec::new();

        for signal in ranked {
            if placed.len() as u32 >= budget {
                tracing::info!("Daily trade limit reached ({}/{})", max, max);
                break;
            }

            let decision = self.decide(signal, &state);
            let side = match decision.action {
                ExecutionAction::Place { side } => side,
                ExecutionAction::Skip => {
                    tracing::info!(instrument = %signal.instrument, "Skipping: {}", decision.reason);
                    continue;
                }
            };

            let request = self.order_request(signal, side);

            match self.broker.place_order(&request).await {
                Ok(Some(order_id)) => {
                    let count = state.daily_trades.increment(today);
                    tracing::info!(
                        instrument = %signal.instrument,
                        order_id = %order_id,
                        "✅ Placed {:?} order, amount {:.2}, TP {:?}, SL {:?} ({}/{} today)",
                        side,
                        request.amount,
                        request.take_profit,
                        request.stop_loss,
                        count,
                        max
                    );
                    state
                        .active_trades
                        .insert(signal.instrument.clone(), order_id.clone());
                    placed.push(order_id);
                }
                Ok(None) => {
                    tracing::warn!(
                        instrument = %signal.instrument,
                        "Broker accepted order without an id, not tracking it"
                    );
                }
                Err(e) => {
                    tracing::error!(instrument = %signal.instrument, "Order placement failed: {}", e);
                }
            }
        }

        placed
    }

    fn decide(&self, signal: &Signal, state: &ExecutorState) -> ExecutionDecision {
        let Some(side) = signal.direction.trade_side() else {
            return ExecutionDecision {
                action: ExecutionAction::Skip,
                reason: "Neutral signal".to_string(),
            };
        };

        if !signal.is_actionable() {
            return ExecutionDecision {
                action: ExecutionAction::Skip,
                reason: format!("Signal too weak ({:.2})", signal.strength),
            };
        }

        if let Some(order_id) = state.active_trades.get(&signal.instrument) {
            return ExecutionDecision {
                action: ExecutionAction::Skip,
                reason: format!("Already have active trade {}", order_id),
            };
        }

        ExecutionDecision {
            action: ExecutionAction::Place { side },
            reason: format!("{} signal with strength {:.2}", signal.direction, signal.strength),
        }
    }

    fn order_request(&self, signal: &Signal, side: TradeSide) -> OrderRequest {
        let instrument = Instrument::new(&signal.instrument);
        let (take_profit, stop_loss) = protective_levels(
            side,
            signal.price,
            instrument.pip_size(),
            self.settings.take_profit_pips,
            self.settings.stop_loss_pips,
        );

        OrderRequest {
            symbol: instrument.broker_symbol().to_string(),
            amount: self.settings.trade_amount,
            side,
            take_profit: Some(take_profit),
            stop_loss: Some(stop_loss),
            demo: self.settings.demo,
        }
    }

    /// Drop records for orders the broker reports as closed or cancelled.
    ///
    /// # Returns
    /// Number of records removed
    pub async fn reconcile(&self) -> usize {
        let mut state = self.state.lock().await;
        let tracked: Vec<(String, String)> = state
            .active_trades
            .iter()
            .map(|(instrument, order_id)| (instrument.clone(), order_id.clone()))
            .collect();

        let mut removed = 0;
        for (instrument, order_id) in tracked {
            match self.broker.order_status(&order_id).await {
                Ok(status) if status.is_terminal() => {
                    state.active_trades.remove(&instrument);
                    removed += 1;
                    tracing::info!(
                        instrument = %instrument,
                        order_id = %order_id,
                        profit = ?status.profit,
                        "Trade {:?} by broker",
                        status.status
                    );
                }
                Ok(status) => {
                    tracing::debug!(
                        instrument = %instrument,
                        order_id = %order_id,
                        "Order still {:?}",
                        status.status
                    );
                }
                Err(e) => {
                    tracing::error!(
                        instrument = %instrument,
                        order_id = %order_id,
                        "Failed to check order status: {}",
                        e
                    );
                }
            }
        }

        removed
    }

    /// Close one order and forget its record once the broker confirms.
    pub async fn close(&self, order_id: &str) -> Result<bool, BrokerError> {
        let mut state = self.state.lock().await;

        let closed = self.broker.close_order(order_id).await?;
        if closed {
            state.active_trades.retain(|_, id| id != order_id);
        }

        Ok(closed)
    }

    /// Close every active trade, continuing past failures.
    ///
    /// # Returns
    /// Number of trades the broker confirmed closed
    pub async fn close_all(&self) -> usize {
        let mut state = self.state.lock().await;
        let tracked: Vec<(String, String)> = state
            .active_trades
            .iter()
            .map(|(instrument, order_id)| (instrument.clone(), order_id.clone()))
            .collect();

        let mut closed = 0;
        for (instrument, order_id) in tracked {
            match self.broker.close_order(&order_id).await {
                Ok(true) => {
                    state.active_trades.remove(&instrument);
                    closed += 1;
                }
                Ok(false) => {
                    tracing::warn!(instrument = %instrument, order_id = %order_id, "Close declined");
                }
                Err(e) => {
                    tracing::error!(
                        instrument = %instrument,
                        order_id = %order_id,
                        "Failed to close trade: {}",
                        e
                    );
                }
            }
        }

        tracing::info!("Closed {} trade(s)", closed);
        closed
    }

    pub async fn reset_daily_counter_if_new_day(&self) {
        self.reset_daily_counter_at(Local::now().date_naive()).await;
    }

    /// Keep only `today` in the daily counter; idempotent
    pub async fn reset_daily_counter_at(&self, today: NaiveDate) {
        let mut state = self.state.lock().await;
        let before = state.daily_trades.days_tracked();
        state.daily_trades.reset_to(today);
        tracing::debug!(
            "Daily trade counter reset, {} stale day(s) dropped, {} trade(s) on {}",
            before.saturating_sub(1),
            state.daily_trades.count_for(today),
            today
        );
    }

    /// Snapshot of instrument -> order id
    pub async fn active_trades(&self) -> HashMap<String, String> {
        self.state.lock().await.active_trades.clone()
    }

    pub async fn trades_today(&self) -> u32 {
        self.trades_on(Local::now().date_naive()).await
    }

    pub async fn trades_on(&self, day: NaiveDate) -> u32 {
        self.state.lock().await.daily_trades.count_for(day)
    }
}
