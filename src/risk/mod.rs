// Risk management module
pub mod daily_limit;

pub use daily_limit::DailyTradeCounter;
