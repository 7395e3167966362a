//! Agent wallet balances

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use crate::chain::contracts::IERC20;
use crate::chain::{chain_err, configured_address};
use crate::config::Args;
use crate::types::Result;

/// ERC-20 token shown in portfolios
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedToken {
    pub symbol: &'static str,
    pub address: Address,
    pub decimals: u8,
}

/// Configured tokens in display order (WETH, vbUSDC, KAT). Unset or zero
/// addresses are left out.
pub fn tracked_tokens(args: &Args) -> Vec<TrackedToken> {
    [
        ("WETH", args.weth_token_address.as_str(), 18),
        ("vbUSDC", args.vbusdc_token_address.as_str(), 6),
        ("KAT", args.kat_token_address.as_str(), 18),
    ]
    .into_iter()
    .filter_map(|(symbol, address, decimals)| {
        configured_address(address).map(|address| TrackedToken {
            symbol,
            address,
            decimals,
        })
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub symbol: String,
    pub address: Address,
    pub balance: String,
    pub balance_raw: String,
    pub value_usd: f64,
    pub pnl_24h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub agent_address: Address,
    pub tokens: Vec<TokenBalance>,
    pub total_value_usd: f64,
    pub pnl_24h: f64,
    pub last_updated: DateTime<Utc>,
}

fn balance_entry(symbol: &str, address: Address, raw: U256, decimals: u8) -> TokenBalance {
    TokenBalance {
        symbol: symbol.to_string(),
        address,
        balance: format_units(raw, decimals).unwrap_or_else(|_| raw.to_string()),
        balance_raw: raw.to_string(),
        value_usd: 0.0,
        pnl_24h: 0.0,
    }
}

pub struct PortfolioService {
    provider: DynProvider,
    tokens: Vec<TrackedToken>,
}

impl PortfolioService {
    pub fn new(provider: DynProvider, tokens: Vec<TrackedToken>) -> Self {
        Self { provider, tokens }
    }

    /// Native balance followed by each tracked token. A token whose balance
    /// cannot be read is skipped.
    pub async fn portfolio(&self, agent: Address) -> Result<Portfolio> {
        let native = self.provider.get_balance(agent).await.map_err(chain_err)?;
        let mut tokens = vec![balance_entry("ETH", Address::ZERO, native, 18)];

        let reads = self.tokens.iter().map(|token| async move {
            let contract = IERC20::new(token.address, self.provider.clone());
            (token, contract.balanceOf(agent).call().await)
        });

        for (token, result) in join_all(reads).await {
            match result {
                Ok(balance) => tokens.push(balance_entry(
                    token.symbol,
                    token.address,
                    balance.balance,
                    token.decimals,
                )),
                Err(e) => {
                    warn!(token = token.symbol, agent = %agent, error = %e, "Token balance read failed")
                }
            }
        }

        let total_value_usd = tokens.iter().map(|t| t.value_usd).sum();
        Ok(Portfolio {
            agent_address: agent,
            tokens,
            total_value_usd,
            pnl_24h: 0.0,
            last_updated: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_tracked_tokens_skip_unconfigured() {
        let args = Args::try_parse_from([
            "synergy-agent",
            "--vbusdc-token-address",
            "0x1111111111111111111111111111111111111111",
            "--kat-token-address",
            "",
        ])
        .unwrap();

        let tokens = tracked_tokens(&args);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].symbol, "vbUSDC");
        assert_eq!(tokens[0].decimals, 6);
    }

    #[test]
    fn test_balance_entry_formats_units() {
        let entry = balance_entry("vbUSDC", Address::ZERO, U256::from(12_345_678u64), 6);
        assert_eq!(entry.balance, "12.345678");
        assert_eq!(entry.balance_raw, "12345678");

        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("pnl24h").is_some());
        assert!(json.get("valueUsd").is_some());
    }
}
