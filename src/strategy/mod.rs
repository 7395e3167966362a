//! Trading strategies run on behalf of registered agents

pub mod dip_buyer;
pub mod oracle;
pub mod swap;

pub use dip_buyer::{min_amount_out, DipBuyer, StrategyParams, StrategyResult, STRATEGY_ID};
pub use oracle::{HttpPriceOracle, PriceOracle};
pub use swap::{ContractRouterCalls, RouterCalls, RouterSwapExecutor, SwapExecutor};
