pub mod instruments;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

pub use instruments::Instrument;

/// Direction of a trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Neutral,
}

impl Direction {
    /// Broker-facing side, `None` for neutral
    pub fn trade_side(self) -> Option<TradeSide> {
        match self {
            Direction::Buy => Some(TradeSide::Buy),
            Direction::Sell => Some(TradeSide::Sell),
            Direction::Neutral => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Minimum strength for a directional signal to be traded
pub const ACTIONABLE_STRENGTH: f64 = 0.5;

/// Raw indicator values as returned by the provider; any of them may be absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorReadings {
    pub rsi: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub close: Option<f64>,
}

impl IndicatorReadings {
    /// Validate the readings into a complete snapshot
    pub fn into_snapshot(self, instrument: &str) -> Result<IndicatorSnapshot, DataError> {
        let field = |value: Option<f64>, name: &'static str| -> Result<f64, DataError> {
            let value = value.ok_or_else(|| DataError::Missing {
                instrument: instrument.to_string(),
                field: name,
            })?;
            if !value.is_finite() {
                return Err(DataError::NonFinite {
                    instrument: instrument.to_string(),
                    field: name,
                    value,
                });
            }
            Ok(value)
        };

        Ok(IndicatorSnapshot {
            instrument: instrument.to_string(),
            rsi: field(self.rsi, "rsi")?,
            ema_fast: field(self.ema_fast, "ema_fast")?,
            ema_slow: field(self.ema_slow, "ema_slow")?,
            last_price: field(self.close, "last_price")?,
        })
    }
}

/// Complete indicator values for one instrument at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub instrument: String,
    pub rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub last_price: f64,
}

/// Trading signal derived from an indicator snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub instrument: String,
    pub direction: Direction,
    pub strength: f64,
    pub price: f64,
    pub rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// BUY or SELL with strength of at least 0.5
    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::Neutral && self.strength >= ACTIONABLE_STRENGTH
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signal({}, {}, strength={:.2}, RSI={:.2}, EMA_fast={:.5}, EMA_slow={:.5})",
            self.instrument, self.direction, self.strength, self.rsi, self.ema_fast, self.ema_slow
        )
    }
}

/// Candle interval the indicator provider computes values on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisInterval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    #[default]
    OneHour,
    TwoHours,
    FourHours,
    OneDay,
    OneWeek,
    OneMonth,
}

impl AnalysisInterval {
    /// Parse an interval, falling back to one hour for anything unsupported
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Unsupported analysis interval '{}', falling back to {}",
                value,
                AnalysisInterval::default()
            );
            AnalysisInterval::default()
        })
    }

    /// Column suffix used by the TradingView scanner; the daily timeframe has none
    pub fn tradingview_suffix(self) -> &'static str {
        match self {
            AnalysisInterval::OneMinute => "|1",
            AnalysisInterval::FiveMinutes => "|5",
            AnalysisInterval::FifteenMinutes => "|15",
            AnalysisInterval::ThirtyMinutes => "|30",
            AnalysisInterval::OneHour => "|60",
            AnalysisInterval::TwoHours => "|120",
            AnalysisInterval::FourHours => "|240",
            AnalysisInterval::OneDay => "",
            AnalysisInterval::OneWeek => "|1W",
            AnalysisInterval::OneMonth => "|1M",
        }
    }
}

impl FromStr for AnalysisInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(AnalysisInterval::OneMinute),
            "5m" => Ok(AnalysisInterval::FiveMinutes),
            "15m" => Ok(AnalysisInterval::FifteenMinutes),
            "30m" => Ok(AnalysisInterval::ThirtyMinutes),
            "1h" => Ok(AnalysisInterval::OneHour),
            "2h" => Ok(AnalysisInterval::TwoHours),
            "4h" => Ok(AnalysisInterval::FourHours),
            "1d" => Ok(AnalysisInterval::OneDay),
            "1w" | "1W" => Ok(AnalysisInterval::OneWeek),
            "1M" | "1mo" => Ok(AnalysisInterval::OneMonth),
            other => Err(format!("unsupported interval: {}", other)),
        }
    }
}

impl fmt::Display for AnalysisInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnalysisInterval::OneMinute => "1m",
            AnalysisInterval::FiveMinutes => "5m",
            AnalysisInterval::FifteenMinutes => "15m",
            AnalysisInterval::ThirtyMinutes => "30m",
            AnalysisInterval::OneHour => "1h",
            AnalysisInterval::TwoHours => "2h",
            AnalysisInterval::FourHours => "4h",
            AnalysisInterval::OneDay => "1d",
            AnalysisInterval::OneWeek => "1W",
            AnalysisInterval::OneMonth => "1M",
        };
        write!(f, "{}", label)
    }
}

// ============== Broker Types ==============

/// Order placement request sent to the broker
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub amount: f64,
    pub side: TradeSide,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub demo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderState {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "open")]
    Open,
    #[serde(alias = "closed")]
    Closed,
    #[serde(alias = "cancelled", alias = "CANCELED", alias = "canceled")]
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// Status of a single broker order
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderStatus {
    #[serde(alias = "id", default, deserialize_with = "string_or_number")]
    pub order_id: Option<String>,
    pub status: OrderState,
    #[serde(default)]
    pub profit: Option<f64>,
    #[serde(default)]
    pub close_price: Option<f64>,
}

impl OrderStatus {
    /// The order no longer holds a position: closed, or cancelled before it opened
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderState::Closed | OrderState::Cancelled)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub equity: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub demo: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenPosition {
    #[serde(alias = "order_id", default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(alias = "asset")]
    pub symbol: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub open_price: Option<f64>,
}

/// Broker ids arrive either as JSON strings or numbers; empty strings count as absent
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
