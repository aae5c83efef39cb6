// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod models;
pub mod risk;
pub mod scheduler;
pub mod strategy;

// Re-export commonly used types
pub use api::{AllCashClient, BrokerGateway, IndicatorSource, TradingViewClient};
pub use crate::config::BotConfig;
pub use error::{AnalysisError, BrokerError, ConfigError, DataError, IndicatorError};
pub use execution::TradeExecutor;
pub use models::*;
pub use scheduler::{CycleReport, Scheduler};
pub use strategy::MarketAnalyzer;
