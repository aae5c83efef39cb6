//! Bot settings: JSON file with environment overrides.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::api::allcash::ALLCASH_API_BASE;
use crate::error::ConfigError;
use crate::models::{AnalysisInterval, Instrument};
use crate::strategy::signals::SignalThresholds;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
const ENV_PREFIX: &str = "FOREXBOT";

/// Persistent bot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub demo_mode: bool,
    pub forex_pairs: Vec<String>,
    pub analysis_interval: String,
    pub schedule_interval_minutes: u64,
    pub trade_amount: f64,
    pub take_profit_pips: u32,
    pub stop_loss_pips: u32,
    pub max_trades_per_day: u32,
    /// Informational; the provider computes RSI with its own period
    pub rsi_period: u32,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub ema_fast_period: u32,
    pub ema_slow_period: u32,
    /// Expiry sent with each order, in minutes
    pub trade_duration_minutes: u32,
    /// Pause between instruments during one analysis pass
    pub analysis_delay_ms: u64,
    pub indicator_requests_per_minute: u32,
    pub broker_base_url: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            demo_mode: true,
            forex_pairs: vec![
                "GBP/USD".to_string(),
                "USD/CHF".to_string(),
                "USD/CAD".to_string(),
            ],
            analysis_interval: "1h".to_string(),
            schedule_interval_minutes: 60,
            trade_amount: 100.0,
            take_profit_pips: 20,
            stop_loss_pips: 10,
            max_trades_per_day: 5,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            ema_fast_period: 9,
            ema_slow_period: 21,
            trade_duration_minutes: 5,
            analysis_delay_ms: 1000,
            indicator_requests_per_minute: 30,
            broker_base_url: ALLCASH_API_BASE.to_string(),
            log_level: "info".to_string(),
            log_dir: Some("logs".to_string()),
            api_key: None,
        }
    }
}

impl BotConfig {
    /// Load settings, creating the file with defaults when it does not exist.
    ///
    /// Environment variables prefixed `FOREXBOT_` override file values
    /// (`FOREXBOT_MAX_TRADES_PER_DAY=3`, `FOREXBOT_FOREX_PAIRS=EUR/USD,USD/JPY`).
    /// A file that cannot be parsed is reported and defaults are used instead.
    pub fn load_or_init(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("No settings at {}, writing defaults", path.display());
            if let Err(e) = Self::default().save(path) {
                tracing::warn!("Failed to write default settings: {}", e);
            }
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(
                    "Failed to load settings from {}: {}. Using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Load settings from an existing file plus environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Json).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("forex_pairs")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Store a rotated API key, leaving every other stored value as written
    pub fn update_api_key(path: impl AsRef<Path>, api_key: &str) -> Result<(), ConfigError> {
        let path = path.as_ref();

        let mut stored = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str::<serde_json::Value>(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                serde_json::to_value(Self::default())?
            }
            Err(e) => return Err(e.into()),
        };

        match stored.as_object_mut() {
            Some(object) => {
                object.insert("api_key".to_string(), api_key.into());
            }
            None => {
                let mut config = Self::default();
                config.api_key = Some(api_key.to_string());
                stored = serde_json::to_value(config)?;
            }
        }

        std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
        tracing::info!("API key updated in {}", path.display());
        Ok(())
    }

    pub fn interval(&self) -> AnalysisInterval {
        AnalysisInterval::parse_or_default(&self.analysis_interval)
    }

    pub fn thresholds(&self) -> SignalThresholds {
        SignalThresholds {
            rsi_oversold: self.rsi_oversold,
            rsi_overbought: self.rsi_overbought,
        }
    }

    pub fn instruments(&self) -> Vec<Instrument> {
        self.forex_pairs
            .iter()
            .map(|pair| pair.trim())
            .filter(|pair| !pair.is_empty())
            .map(Instrument::new)
            .inspect(|instrument| {
                if !instrument.is_supported_pair() {
                    tracing::warn!(
                        "{} is not a catalogued pair, using provider symbol {}",
                        instrument.id,
                        instrument.provider_symbol
                    );
                }
            })
            .collect()
    }

    /// Time between scheduled cycles, never less than one minute
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_minutes.max(1) * 60)
    }

    pub fn analysis_delay(&self) -> Duration {
        Duration::from_millis(self.analysis_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = BotConfig::load_or_init(&path);

        assert!(path.exists());
        assert_eq!(config.forex_pairs, vec!["GBP/USD", "USD/CHF", "USD/CAD"]);
        assert_eq!(config.max_trades_per_day, 5);
        assert!(config.demo_mode);
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            json!({
                "forex_pairs": ["EUR/USD", "USD/JPY"],
                "max_trades_per_day": 2,
                "analysis_interval": "4h"
            })
            .to_string(),
        )
        .unwrap();

        let config = BotConfig::load_or_init(&path);

        assert_eq!(config.max_trades_per_day, 2);
        assert_eq!(config.interval(), AnalysisInterval::FourHours);
        assert_eq!(config.take_profit_pips, 20);
        assert_eq!(config.rsi_overbought, 70.0);
        let ids: Vec<_> = config.instruments().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["EUR/USD", "USD/JPY"]);
    }

    #[test]
    fn test_unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = BotConfig::load_or_init(&path);
        assert_eq!(config, BotConfig::default());
    }

    #[test]
    fn test_update_api_key_preserves_other_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            json!({ "trade_amount": 250.0, "api_key": "old" }).to_string(),
        )
        .unwrap();

        BotConfig::update_api_key(&path, "new").unwrap();

        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored["api_key"], "new");
        assert_eq!(stored["trade_amount"], 250.0);
        assert!(stored.get("max_trades_per_day").is_none());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = BotConfig {
            api_key: Some("secret".to_string()),
            stop_loss_pips: 15,
            ..BotConfig::default()
        };

        config.save(&path).unwrap();

        assert_eq!(BotConfig::load_or_init(&path), config);
    }

    #[test]
    fn test_derived_settings() {
        let config = BotConfig {
            schedule_interval_minutes: 0,
            analysis_interval: "3h".to_string(),
            forex_pairs: vec!["EUR/USD".to_string(), " ".to_string()],
            ..BotConfig::default()
        };

        assert_eq!(config.schedule_interval(), Duration::from_secs(60));
        assert_eq!(config.interval(), AnalysisInterval::OneHour);
        assert_eq!(config.instruments().len(), 1);
        assert_eq!(config.thresholds(), SignalThresholds::default());
    }
}
