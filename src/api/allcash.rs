use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{http_client, BrokerGateway, TokenRefresher};
use crate::error::{mentions_expired_token, BrokerError};
use crate::models::{
    string_or_number, AccountInfo, OpenPosition, OrderRequest, OrderStatus, TradeSide,
};

pub const ALLCASH_API_BASE: &str = "https://allcash.site/api/v1.1";
const DEFAULT_TRADE_DURATION_MINUTES: u32 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the AllCash broker order-entry API
///
/// Requests carry `Authorization: Bearer <token>`. When the broker rejects the
/// token (401/403 or an expired-token error payload) the client asks its
/// [`TokenRefresher`] for a new one and retries the call once.
#[derive(Clone)]
pub struct AllCashClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<String>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    trade_duration_minutes: u32,
    demo: bool,
}

// ============== Request / Response Types ==============

#[derive(Debug, Serialize)]
struct TradeBody<'a> {
    amount: f64,
    direction: &'static str,
    asset: &'a str,
    time: u32,
    demo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_loss: Option<f64>,
}

#[derive(Debug, Serialize)]
struct CloseBody<'a> {
    order_id: &'a str,
    demo: bool,
}

#[derive(Debug, Serialize)]
struct ModifyBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_loss: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TradeResponse {
    #[serde(default, alias = "id", deserialize_with = "string_or_number")]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
struct PositionsResponse {
    #[serde(default)]
    positions: Vec<OpenPosition>,
}

// ============== Implementation ==============

impl AllCashClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
            base_url: ALLCASH_API_BASE.to_string(),
            token: Arc::new(RwLock::new(api_key.into())),
            refresher: None,
            trade_duration_minutes: DEFAULT_TRADE_DURATION_MINUTES,
            demo: true,
        }
    }

    /// Account mode sent with close requests; orders carry their own flag
    pub fn with_demo(mut self, demo: bool) -> Self {
        self.demo = demo;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn with_trade_duration(mut self, minutes: u32) -> Self {
        self.trade_duration_minutes = minutes;
        self
    }

    /// Authenticated request with at most one credential renewal
    async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, BrokerError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let mut renewed = false;

        loop {
            match self.request_once(method.clone(), path, body).await {
                Err(e) if e.is_auth_failure() && !renewed => {
                    let Some(refresher) = &self.refresher else {
                        return Err(BrokerError::Authentication(e.to_string()));
                    };

                    tracing::warn!("Broker rejected credential on {} ({}), renewing", path, e);
                    let token = refresher.refresh().await?;
                    *self.token.write().await = token;
                    renewed = true;
                }
                Err(e) if e.is_auth_failure() => {
                    return Err(BrokerError::Authentication(e.to_string()));
                }
                result => return result,
            }
        }
    }

    async fn request_once<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, BrokerError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        let token = self.token.read().await.clone();

        let mut builder = self
            .client
            .request(method, &url)
            .bearer_auth(token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if mentions_expired_token(&text) {
                return Err(BrokerError::Authentication(text));
            }
            return Err(BrokerError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| BrokerError::Decode(format!("{}: {}", e, text)))?;

        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(BrokerError::Api(message));
        }

        serde_json::from_value(value).map_err(|e| BrokerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BrokerGateway for AllCashClient {
    /// Endpoint: POST /signal/trade
    async fn place_order(&self, request: &OrderRequest) -> Result<Option<String>, BrokerError> {
        let body = TradeBody {
            amount: request.amount,
            direction: match request.side {
                TradeSide::Buy => "CALL",
                TradeSide::Sell => "PUT",
            },
            asset: &request.symbol,
            time: self.trade_duration_minutes,
            demo: request.demo,
            take_profit: request.take_profit,
            stop_loss: request.stop_loss,
        };

        let response: TradeResponse = self
            .request(Method::POST, "/signal/trade", Some(&body))
            .await?;

        match &response.order_id {
            Some(id) => tracing::info!(symbol = %request.symbol, order_id = %id, "Order placed"),
            None => tracing::warn!(symbol = %request.symbol, "Broker returned no order id"),
        }

        Ok(response.order_id)
    }

    /// Endpoint: POST /signal/close
    async fn close_order(&self, order_id: &str) -> Result<bool, BrokerError> {
        let response: SuccessResponse = self
            .request(
                Method::POST,
                "/signal/close",
                Some(&CloseBody {
                    order_id,
                    demo: self.demo,
                }),
            )
            .await?;

        if response.success {
            tracing::info!(order_id, "Closed order");
        } else {
            tracing::warn!(order_id, "Broker declined to close order");
        }

        Ok(response.success)
    }

    /// Endpoint: GET /orders/{id}
    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, BrokerError> {
        self.request::<OrderStatus, ()>(Method::GET, &format!("/orders/{}", order_id), None)
            .await
    }

    /// Endpoint: PUT /orders/{id}
    async fn modify_order(
        &self,
        order_id: &str,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> Result<bool, BrokerError> {
        if take_profit.is_none() && stop_loss.is_none() {
            return Ok(true);
        }

        let response: SuccessResponse = self
            .request(
                Method::PUT,
                &format!("/orders/{}", order_id),
                Some(&ModifyBody {
                    take_profit,
                    stop_loss,
                }),
            )
            .await?;

        if response.success {
            tracing::info!(order_id, ?take_profit, ?stop_loss, "Modified order");
        } else {
            tracing::warn!(order_id, "Broker declined to modify order");
        }

        Ok(response.success)
    }

    /// Endpoint: GET /account
    async fn account_info(&self) -> Result<AccountInfo, BrokerError> {
        self.request::<AccountInfo, ()>(Method::GET, "/account", None)
            .await
    }

    /// Endpoint: GET /positions
    async fn open_positions(&self) -> Result<Vec<OpenPosition>, BrokerError> {
        let response: PositionsResponse = self
            .request::<PositionsResponse, ()>(Method::GET, "/positions", None)
            .await?;
        Ok(response.positions)
    }
}
