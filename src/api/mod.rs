pub mod allcash;
pub mod credentials;
pub mod tradingview;

pub use allcash::AllCashClient;
pub use credentials::{EnvTokenRefresher, TokenRefresher};
pub use tradingview::TradingViewClient;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::{BrokerError, IndicatorError};
use crate::models::{
    AccountInfo, AnalysisInterval, IndicatorReadings, Instrument, OpenPosition, OrderRequest,
    OrderStatus,
};

/// Source of current technical indicator values
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    /// Fetch RSI, fast/slow EMA and last close for one instrument.
    ///
    /// Fields the provider has no value for come back as `None`; transport
    /// and protocol failures are errors.
    async fn fetch_indicators(
        &self,
        instrument: &Instrument,
        interval: AnalysisInterval,
    ) -> Result<IndicatorReadings, IndicatorError>;
}

/// Order-entry API of the broker.
///
/// Implementations handle authentication themselves, including renewing an
/// expired credential once per call.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Submit a new order.
    ///
    /// # Returns
    /// The broker's order id, or `None` if the broker accepted the request
    /// without assigning one.
    async fn place_order(&self, request: &OrderRequest) -> Result<Option<String>, BrokerError>;

    /// Close an open order. `Ok(false)` means the broker declined.
    async fn close_order(&self, order_id: &str) -> Result<bool, BrokerError>;

    /// Get the status of an order.
    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, BrokerError>;

    /// Update take-profit and/or stop-loss levels of an order.
    ///
    /// Leaving both unset is a successful no-op.
    async fn modify_order(
        &self,
        order_id: &str,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> Result<bool, BrokerError>;

    /// Get account balance information.
    async fn account_info(&self) -> Result<AccountInfo, BrokerError>;

    /// Get all open positions.
    async fn open_positions(&self) -> Result<Vec<OpenPosition>, BrokerError>;
}

/// HTTP client with a per-request timeout.
///
/// Falls back to reqwest defaults, without the timeout, if the TLS backend
/// cannot be initialised.
pub(crate) fn http_client(timeout: Duration) -> Client {
    match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(
                "Failed to build HTTP client with {:?} timeout ({}), using defaults",
                timeout,
                e
            );
            Client::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_http_client_applies_timeout() {
        // Accepts connections but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = http_client(Duration::from_millis(200));
        let err = client
            .get(format!("http://{}/silent", addr))
            .send()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        server.abort();
    }
}
