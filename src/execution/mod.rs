// Order execution module
pub mod executor;

pub use executor::{
    protective_levels, ExecutionAction, ExecutionDecision, ExecutorSettings, TradeExecutor,
};
