// Signal generation module
pub mod analyzer;
pub mod signals;

pub use analyzer::{AnalyzerSettings, MarketAnalyzer};
pub use signals::{evaluate, Evaluation, SignalThresholds};
