#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use forexbot::models::{
    AccountInfo, AnalysisInterval, Direction, IndicatorReadings, Instrument, OpenPosition,
    OrderRequest, OrderState, OrderStatus, Signal,
};
use forexbot::{BrokerError, BrokerGateway, IndicatorError, IndicatorSource};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory broker that records every call
#[derive(Default)]
pub struct FakeBroker {
    pub placed: Mutex<Vec<OrderRequest>>,
    pub closed: Mutex<Vec<String>>,
    /// order id -> state reported by `order_status`
    pub states: Mutex<HashMap<String, OrderState>>,
    /// instruments whose placement fails with an error
    pub reject_symbols: HashSet<String>,
    /// instruments accepted without an order id
    pub no_id_symbols: HashSet<String>,
    /// order ids whose status lookup fails
    pub status_errors: HashSet<String>,
    /// order ids the broker refuses to close
    pub close_refused: HashSet<String>,
    /// order ids whose close request fails with an error
    pub close_errors: HashSet<String>,
    /// instruments whose placement panics inside the gateway
    pub panic_symbols: HashSet<String>,
}

impl FakeBroker {
    pub fn placed_symbols(&self) -> Vec<String> {
        self.placed
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.symbol.clone())
            .collect()
    }

    pub fn set_state(&self, order_id: &str, state: OrderState) {
        self.states
            .lock()
            .unwrap()
            .insert(order_id.to_string(), state);
    }
}

#[async_trait]
impl BrokerGateway for FakeBroker {
    async fn place_order(&self, request: &OrderRequest) -> Result<Option<String>, BrokerError> {
        if self.panic_symbols.contains(&request.symbol) {
            panic!("gateway blew up placing {}", request.symbol);
        }
        if self.reject_symbols.contains(&request.symbol) {
            return Err(BrokerError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        if self.no_id_symbols.contains(&request.symbol) {
            return Ok(None);
        }

        let mut placed = self.placed.lock().unwrap();
        placed.push(request.clone());
        let order_id = format!("{}-{}", request.symbol.replace('/', ""), placed.len());
        self.set_state(&order_id, OrderState::Open);
        Ok(Some(order_id))
    }

    async fn close_order(&self, order_id: &str) -> Result<bool, BrokerError> {
        if self.close_refused.contains(order_id) {
            return Ok(false);
        }
        if self.close_errors.contains(order_id) {
            return Err(BrokerError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        self.closed.lock().unwrap().push(order_id.to_string());
        self.set_state(order_id, OrderState::Closed);
        Ok(true)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, BrokerError> {
        if self.status_errors.contains(order_id) {
            return Err(BrokerError::Api("Order lookup failed".to_string()));
        }
        let status = self
            .states
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .unwrap_or(OrderState::Unknown);

        Ok(OrderStatus {
            order_id: Some(order_id.to_string()),
            status,
            profit: None,
            close_price: None,
        })
    }

    async fn modify_order(
        &self,
        _order_id: &str,
        _take_profit: Option<f64>,
        _stop_loss: Option<f64>,
    ) -> Result<bool, BrokerError> {
        Ok(true)
    }

    async fn account_info(&self) -> Result<AccountInfo, BrokerError> {
        Ok(AccountInfo {
            balance: Some(10_000.0),
            ..AccountInfo::default()
        })
    }

    async fn open_positions(&self) -> Result<Vec<OpenPosition>, BrokerError> {
        Ok(Vec::new())
    }
}

/// Indicator source serving fixed readings; unknown instruments fail
#[derive(Default)]
pub struct FakeIndicators {
    pub readings: HashMap<String, IndicatorReadings>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeIndicators {
    pub fn with(mut self, instrument: &str, rsi: f64, ema_fast: f64, ema_slow: f64, close: f64) -> Self {
        self.readings.insert(
            instrument.to_string(),
            IndicatorReadings {
                rsi: Some(rsi),
                ema_fast: Some(ema_fast),
                ema_slow: Some(ema_slow),
                close: Some(close),
            },
        );
        self
    }

    pub fn with_readings(mut self, instrument: &str, readings: IndicatorReadings) -> Self {
        self.readings.insert(instrument.to_string(), readings);
        self
    }
}

#[async_trait]
impl IndicatorSource for FakeIndicators {
    async fn fetch_indicators(
        &self,
        instrument: &Instrument,
        _interval: AnalysisInterval,
    ) -> Result<IndicatorReadings, IndicatorError> {
        self.calls.lock().unwrap().push(instrument.id.clone());
        self.readings
            .get(&instrument.id)
            .cloned()
            .ok_or_else(|| IndicatorError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
    }
}

pub fn signal(instrument: &str, direction: Direction, strength: f64) -> Signal {
    Signal {
        instrument: instrument.to_string(),
        direction,
        strength,
        price: if instrument.contains("JPY") { 150.0 } else { 1.25 },
        rsi: 50.0,
        ema_fast: 1.0,
        ema_slow: 1.0,
        timestamp: Utc::now(),
    }
}
