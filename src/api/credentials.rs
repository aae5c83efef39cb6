use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::BotConfig;
use crate::error::BrokerError;

pub const API_KEY_ENV: &str = "ALLCASH_API_KEY";

/// Supplies a fresh bearer credential after the broker rejected the current one
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<String, BrokerError>;
}

/// Rereads the API key from the environment (and `.env`), persisting rotated keys
pub struct EnvTokenRefresher {
    var: String,
    config_path: Option<PathBuf>,
}

impl EnvTokenRefresher {
    pub fn new() -> Self {
        Self {
            var: API_KEY_ENV.to_string(),
            config_path: None,
        }
    }

    pub fn with_var(mut self, var: impl Into<String>) -> Self {
        self.var = var.into();
        self
    }

    /// Write renewed keys back to this settings file
    pub fn persist_to(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(config_path.into());
        self
    }
}

impl Default for EnvTokenRefresher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenRefresher for EnvTokenRefresher {
    async fn refresh(&self) -> Result<String, BrokerError> {
        // Pick up a key rotated into .env while running
        dotenvy::dotenv_override().ok();

        let token = std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BrokerError::Credential(format!("{} is not set", self.var)))?;

        if let Some(path) = &self.config_path {
            if let Err(e) = BotConfig::update_api_key(path, &token) {
                tracing::warn!("Failed to persist rotated API key to {}: {}", path.display(), e);
            }
        }

        tracing::info!("Broker credential renewed from {}", self.var);
        Ok(token)
    }
}
