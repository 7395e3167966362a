//! Simple ETH dip buyer
//!
//! Buys WETH with vbUSDC when the spot ETH price is at or below a ceiling.
//! The run never fails: every error becomes a non-executed result with a
//! reason.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, B256, U256};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use super::oracle::PriceOracle;
use super::swap::SwapExecutor;
use crate::types::{AgentError, Result};

pub const STRATEGY_ID: &str = "simple-eth-dip-buyer";

/// Tolerated slippage on the quoted output
pub const SLIPPAGE_PERCENT: u64 = 1;

/// vbUSDC decimals
pub const USDC_DECIMALS: u8 = 6;

#[derive(Debug, Clone, Copy)]
pub struct StrategyParams {
    pub agent: Address,
    /// vbUSDC in base units (6 decimals)
    pub amount_in: U256,
    /// Execute only when ETH/USD <= this
    pub max_eth_price_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyResult {
    pub executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_price: Option<f64>,
    /// Minimum WETH received, formatted in ether
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_out: Option<String>,
}

impl StrategyResult {
    fn skipped(reason: String, eth_price: Option<f64>) -> Self {
        Self {
            executed: false,
            tx_hash: None,
            reason: Some(reason),
            eth_price,
            amount_out: None,
        }
    }
}

/// Expected WETH output (wei) for `amount_in` vbUSDC at `eth_price`, less
/// `slippage_percent`.
///
/// USD value is computed in floating point and floored to whole wei before
/// the integer slippage cut. Inputs or outputs beyond `u128` are rejected
/// rather than clamped.
pub fn min_amount_out(amount_in: U256, eth_price: f64, slippage_percent: u64) -> Result<U256> {
    let amount = u128::try_from(amount_in)
        .map_err(|_| AgentError::Validation(format!("amountIn {} is out of range", amount_in)))?;

    let usd_value = amount as f64 / 1e6;
    let weth_amount = usd_value / eth_price;
    let weth_wei = (weth_amount * 1e18).floor();
    if !weth_wei.is_finite() || weth_wei < 0.0 || weth_wei >= U128_LIMIT {
        return Err(AgentError::Validation(format!(
            "expected output for amountIn {} at ${} is out of range",
            amount_in, eth_price
        )));
    }

    Ok(U256::from(weth_wei as u128) * U256::from(100 - slippage_percent.min(100)) / U256::from(100u64))
}

/// 2^128 as f64
const U128_LIMIT: f64 = 340_282_366_920_938_463_463_374_607_431_768_211_456.0;

pub struct DipBuyer {
    oracle: Arc<dyn PriceOracle>,
    executor: Arc<dyn SwapExecutor>,
}

impl DipBuyer {
    pub fn new(oracle: Arc<dyn PriceOracle>, executor: Arc<dyn SwapExecutor>) -> Self {
        Self { oracle, executor }
    }

    pub async fn run(&self, params: StrategyParams) -> StrategyResult {
        match self.try_run(&params).await {
            Ok(result) => result,
            Err(e) => {
                error!(agent = %params.agent, error = %e, "Dip buyer execution failed");
                StrategyResult::skipped(format!("Execution error: {}", e), None)
            }
        }
    }

    async fn try_run(&self, params: &StrategyParams) -> Result<StrategyResult> {
        let eth_price = self.oracle.eth_usd_price().await?;
        info!(agent = %params.agent, eth_price, ceiling = params.max_eth_price_usd, "Dip buyer check");

        if eth_price > params.max_eth_price_usd {
            return Ok(StrategyResult::skipped(
                format!(
                    "ETH price (${:.2}) is above threshold (${})",
                    eth_price, params.max_eth_price_usd
                ),
                Some(eth_price),
            ));
        }

        let min_out = min_amount_out(params.amount_in, eth_price, SLIPPAGE_PERCENT)?;
        let tx_hash = self
            .executor
            .swap_exact_in(params.amount_in, min_out, params.agent)
            .await?;

        info!(agent = %params.agent, tx = %tx_hash, "Dip buyer executed");
        Ok(StrategyResult {
            executed: true,
            tx_hash: Some(tx_hash),
            reason: None,
            eth_price: Some(eth_price),
            amount_out: Some(format_ether(min_out)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_amount_out_values() {
        let cases: [(u64, f64, &str); 4] = [
            (1_000_000_000, 3000.0, "329999999999999978"),
            (250_000_000, 2500.5, "98980203959208158"),
            (1, 3000.0, "329999999"),
            (5_000_000_000, 1234.56, "4009525660964230133"),
        ];
        for (amount, price, expected) in cases {
            assert_eq!(
                min_amount_out(U256::from(amount), price, SLIPPAGE_PERCENT)
                    .unwrap()
                    .to_string(),
                expected,
                "amount {} price {}",
                amount,
                price
            );
        }
    }

    #[test]
    fn test_zero_amount_gives_zero() {
        assert_eq!(min_amount_out(U256::ZERO, 3000.0, 1).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_out_of_range_amounts_are_rejected() {
        let too_large = U256::from(u128::MAX) + U256::from(1u64);
        let err = min_amount_out(too_large, 3000.0, SLIPPAGE_PERCENT).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        // Fits u128 on input, but the wei output does not
        let err = min_amount_out(U256::from(u128::MAX), 1e-6, SLIPPAGE_PERCENT).unwrap_err();
        assert!(err.to_string().contains("expected output"));

        // Largest input still converts without clamping
        let out = min_amount_out(U256::from(u128::MAX), 1e30, SLIPPAGE_PERCENT).unwrap();
        assert!(out > U256::ZERO);
    }

    #[test]
    fn test_skipped_result_serialization() {
        let result = StrategyResult::skipped("nope".into(), Some(3000.0));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"executed": false, "reason": "nope", "ethPrice": 3000.0})
        );
    }
}
