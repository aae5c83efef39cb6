//! Error types for the trading bot.

use thiserror::Error;

/// Failures talking to the indicator provider.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Indicator API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("No data returned for {0}")]
    UnknownSymbol(String),

    #[error("Malformed indicator response: {0}")]
    Decode(String),
}

/// Indicator payload that cannot be turned into a snapshot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("missing {field} for {instrument}")]
    Missing {
        instrument: String,
        field: &'static str,
    },

    #[error("non-finite {field} ({value}) for {instrument}")]
    NonFinite {
        instrument: String,
        field: &'static str,
        value: f64,
    },
}

/// Outcome of analyzing a single instrument when no signal could be produced.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] IndicatorError),

    #[error("incomplete data: {0}")]
    MissingData(#[from] DataError),
}

/// Broker gateway errors.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Broker API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Broker rejected request: {0}")]
    Api(String),

    #[error("Malformed broker response: {0}")]
    Decode(String),

    #[error("Credential refresh failed: {0}")]
    Credential(String),
}

impl BrokerError {
    /// True for failures that a renewed credential may fix.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            BrokerError::Authentication(_) => true,
            BrokerError::Status { status, .. } => *status == 401 || *status == 403,
            BrokerError::Api(message) => mentions_expired_token(message),
            _ => false,
        }
    }
}

pub(crate) fn mentions_expired_token(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("token") && (message.contains("expired") || message.contains("invalid"))
}

/// Configuration store errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}
