use serde::{Deserialize, Serialize};

/// Pairs the bot knows provider symbols and pip sizes for
pub const SUPPORTED_PAIRS: &[(&str, &str)] = &[
    ("EUR/USD", "EURUSD"),
    ("GBP/USD", "GBPUSD"),
    ("USD/JPY", "USDJPY"),
    ("USD/CHF", "USDCHF"),
    ("USD/CAD", "USDCAD"),
    ("AUD/USD", "AUDUSD"),
    ("NZD/USD", "NZDUSD"),
    ("EUR/GBP", "EURGBP"),
    ("EUR/JPY", "EURJPY"),
    ("GBP/JPY", "GBPJPY"),
    ("USD/ZAR", "USDZAR"),
    ("USD/MXN", "USDMXN"),
];

const FOREX_EXCHANGE: &str = "FX_IDC";
const CRYPTO_EXCHANGE: &str = "BINANCE";

const STANDARD_PIP: f64 = 0.0001;
const JPY_PIP: f64 = 0.01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Forex,
    Crypto,
}

/// A tradable pair, keyed by the identifier used in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instrument {
    /// Identifier as configured, e.g. "GBP/USD" or "ETHUSDT"
    pub id: String,
    pub kind: MarketKind,
    /// Symbol understood by the indicator provider, e.g. "GBPUSD"
    pub provider_symbol: String,
    pub exchange: String,
}

impl Instrument {
    /// Build an instrument from its configured identifier
    ///
    /// Identifiers with a slash are FX pairs; anything else is treated as a crypto pair.
    pub fn new(id: &str) -> Self {
        let id = id.trim().to_string();

        if id.contains('/') {
            let provider_symbol = SUPPORTED_PAIRS
                .iter()
                .find(|(pair, _)| *pair == id)
                .map(|(_, symbol)| symbol.to_string())
                .unwrap_or_else(|| id.replace('/', ""));

            Self {
                id,
                kind: MarketKind::Forex,
                provider_symbol,
                exchange: FOREX_EXCHANGE.to_string(),
            }
        } else {
            Self {
                provider_symbol: id.to_uppercase(),
                id,
                kind: MarketKind::Crypto,
                exchange: CRYPTO_EXCHANGE.to_string(),
            }
        }
    }

    /// Symbol sent to the broker's order endpoints
    pub fn broker_symbol(&self) -> &str {
        &self.id
    }

    /// TradingView ticker in `EXCHANGE:SYMBOL` form
    pub fn ticker(&self) -> String {
        format!("{}:{}", self.exchange, self.provider_symbol)
    }

    /// TradingView screener the ticker is listed in
    pub fn screener(&self) -> &'static str {
        match self.kind {
            MarketKind::Forex => "forex",
            MarketKind::Crypto => "crypto",
        }
    }

    /// Price units of one pip
    pub fn pip_size(&self) -> f64 {
        pip_size(&self.id)
    }

    pub fn is_supported_pair(&self) -> bool {
        SUPPORTED_PAIRS.iter().any(|(pair, _)| *pair == self.id)
    }
}

/// 0.01 for anything quoted against or in JPY, 0.0001 otherwise
pub fn pip_size(instrument: &str) -> f64 {
    if instrument.to_uppercase().contains("JPY") {
        JPY_PIP
    } else {
        STANDARD_PIP
    }
}
