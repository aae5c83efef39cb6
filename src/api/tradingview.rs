use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::{http_client, IndicatorSource};
use crate::error::IndicatorError;
use crate::models::{AnalysisInterval, IndicatorReadings, Instrument};

const TRADINGVIEW_SCANNER_BASE: &str = "https://scanner.tradingview.com";
const DEFAULT_RATE_LIMIT_RPM: u32 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 15;

type ScannerRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Client for the TradingView scanner (technical indicator values)
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct TradingViewClient {
    client: Client,
    base_url: String,
    ema_fast_period: u32,
    ema_slow_period: u32,
    rate_limiter: Arc<ScannerRateLimiter>,
}

// ============== Request / Response Types ==============

#[derive(Debug, Serialize)]
struct ScanRequest {
    symbols: ScanSymbols,
    columns: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ScanSymbols {
    tickers: Vec<String>,
    query: ScanQuery,
}

#[derive(Debug, Serialize, Default)]
struct ScanQuery {
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    data: Vec<ScanRow>,
}

#[derive(Debug, Deserialize)]
struct ScanRow {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "d")]
    values: Vec<Option<f64>>,
}

// ============== Implementation ==============

impl TradingViewClient {
    pub fn new(ema_fast_period: u32, ema_slow_period: u32) -> Self {
        Self::with_rate_limit(ema_fast_period, ema_slow_period, DEFAULT_RATE_LIMIT_RPM)
    }

    pub fn with_rate_limit(
        ema_fast_period: u32,
        ema_slow_period: u32,
        requests_per_minute: u32,
    ) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));

        Self {
            client: http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
            base_url: TRADINGVIEW_SCANNER_BASE.to_string(),
            ema_fast_period,
            ema_slow_period,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Point the client at a different scanner host (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Scanner columns in the order [RSI, EMA fast, EMA slow, close]
    fn columns(&self, interval: AnalysisInterval) -> Vec<String> {
        let suffix = interval.tradingview_suffix();
        vec![
            format!("RSI{}", suffix),
            format!("EMA{}{}", self.ema_fast_period, suffix),
            format!("EMA{}{}", self.ema_slow_period, suffix),
            format!("close{}", suffix),
        ]
    }
}

#[async_trait]
impl IndicatorSource for TradingViewClient {
    /// Endpoint: POST /{screener}/scan
    async fn fetch_indicators(
        &self,
        instrument: &Instrument,
        interval: AnalysisInterval,
    ) -> Result<IndicatorReadings, IndicatorError> {
        let ticker = instrument.ticker();
        let url = format!("{}/{}/scan", self.base_url, instrument.screener());
        let request = ScanRequest {
            symbols: ScanSymbols {
                tickers: vec![ticker.clone()],
                query: ScanQuery::default(),
            },
            columns: self.columns(interval),
        };

        self.rate_limiter.until_ready().await;

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(IndicatorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let scan: ScanResponse = response
            .json()
            .await
            .map_err(|e| IndicatorError::Decode(e.to_string()))?;

        let row = scan
            .data
            .into_iter()
            .find(|row| row.symbol == ticker)
            .ok_or_else(|| IndicatorError::UnknownSymbol(ticker.clone()))?;

        let value = |index: usize| row.values.get(index).copied().flatten();

        tracing::debug!(
            instrument = %instrument.id,
            ticker = %ticker,
            values = ?row.values,
            "Fetched indicator row"
        );

        Ok(IndicatorReadings {
            rsi: value(0),
            ema_fast: value(1),
            ema_slow: value(2),
            close: value(3),
        })
    }
}
