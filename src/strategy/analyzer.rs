use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::signals::{evaluate, SignalThresholds};
use crate::api::IndicatorSource;
use crate::config::BotConfig;
use crate::error::AnalysisError;
use crate::models::{AnalysisInterval, Direction, Instrument, Signal};

/// What the analyzer scans and how it scores
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub instruments: Vec<Instrument>,
    pub interval: AnalysisInterval,
    pub thresholds: SignalThresholds,
    /// Pause between consecutive instrument fetches
    pub delay: Duration,
}

impl From<&BotConfig> for AnalyzerSettings {
    fn from(config: &BotConfig) -> Self {
        Self {
            instruments: config.instruments(),
            interval: config.interval(),
            thresholds: config.thresholds(),
            delay: config.analysis_delay(),
        }
    }
}

/// Turns indicator snapshots for the configured instruments into signals
#[derive(Clone)]
pub struct MarketAnalyzer {
    source: Arc<dyn IndicatorSource>,
    settings: AnalyzerSettings,
}

impl MarketAnalyzer {
    pub fn new(source: Arc<dyn IndicatorSource>, settings: AnalyzerSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyze every configured instrument in order.
    ///
    /// Instruments whose data cannot be fetched or is incomplete are logged and
    /// skipped; the rest of the batch still runs. Only directional signals are
    /// returned.
    pub async fn analyze_markets(&self) -> Vec<Signal> {
        let mut signals = Vec::new();

        for (index, instrument) in self.settings.instruments.iter().enumerate() {
            if index > 0 && !self.settings.delay.is_zero() {
                tokio::time::sleep(self.settings.delay).await;
            }

            match self.analyze_instrument(instrument).await {
                Ok(Some(signal)) => {
                    tracing::info!("Generated signal: {}", signal);
                    signals.push(signal);
                }
                Ok(None) => {
                    tracing::debug!(instrument = %instrument.id, "No directional signal");
                }
                Err(AnalysisError::MissingData(e)) => {
                    tracing::warn!(instrument = %instrument.id, "Skipping: {}", e);
                }
                Err(e) => {
                    tracing::error!(instrument = %instrument.id, "Analysis failed: {}", e);
                }
            }
        }

        tracing::info!(
            "Analysis complete: {} signal(s) from {} instrument(s)",
            signals.len(),
            self.settings.instruments.len()
        );

        signals
    }

    /// Fetch and score one instrument.
    ///
    /// `Ok(None)` means the data was complete but neither indicator is directional.
    pub async fn analyze_instrument(
        &self,
        instrument: &Instrument,
    ) -> Result<Option<Signal>, AnalysisError> {
        let readings = self
            .source
            .fetch_indicators(instrument, self.settings.interval)
            .await?;
        let snapshot = readings.into_snapshot(&instrument.id)?;

        let evaluation = evaluate(
            snapshot.rsi,
            snapshot.ema_fast,
            snapshot.ema_slow,
            &self.settings.thresholds,
        );

        tracing::debug!(
            instrument = %instrument.id,
            rsi = snapshot.rsi,
            ema_fast = snapshot.ema_fast,
            ema_slow = snapshot.ema_slow,
            direction = %evaluation.direction,
            strength = evaluation.strength,
            "Evaluated indicators"
        );

        if evaluation.direction == Direction::Neutral {
            return Ok(None);
        }

        Ok(Some(Signal {
            instrument: snapshot.instrument,
            direction: evaluation.direction,
            strength: evaluation.strength,
            price: snapshot.last_price,
            rsi: snapshot.rsi,
            ema_fast: snapshot.ema_fast,
            ema_slow: snapshot.ema_slow,
            timestamp: Utc::now(),
        }))
    }
}
