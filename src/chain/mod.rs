//! EVM connectivity
//!
//! [`ChainContext`] owns the JSON-RPC provider and the operator wallet that
//! signs every transaction the backend submits. It is built once at startup
//! and shared through the application state.

pub mod contracts;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use serde::Serialize;
use std::str::FromStr;
use tracing::info;

use crate::types::{AgentError, Result};

/// Provider + operator wallet
pub struct ChainContext {
    provider: DynProvider,
    operator: Address,
}

impl ChainContext {
    /// Connect to the RPC endpoint with the operator's private key.
    ///
    /// The HTTP transport is lazy: this only fails on a malformed URL or key.
    pub fn connect(rpc_url: &str, private_key: &str) -> Result<Self> {
        let signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|e| AgentError::Config(format!("AGENT_PRIVATE_KEY is malformed: {}", e)))?;
        let url = Url::parse(rpc_url.trim())
            .map_err(|e| AgentError::Config(format!("KATANA_RPC_URL is malformed: {}", e)))?;

        let operator = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(url)
            .erased();

        info!(operator = %operator, "Chain provider initialized");

        Ok(Self { provider, operator })
    }

    /// Read-only provider without a wallet (used for foreign chains)
    pub fn read_only(rpc_url: &str) -> Result<DynProvider> {
        let url = Url::parse(rpc_url.trim())
            .map_err(|e| AgentError::Config(format!("invalid RPC URL {}: {}", rpc_url, e)))?;
        Ok(ProviderBuilder::new().on_http(url).erased())
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Address of the wallet that signs transactions
    pub fn operator(&self) -> Address {
        self.operator
    }
}

/// Result of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutcome {
    pub tx_hash: B256,
    /// Receipt status; `false` when the transaction reverted
    pub success: bool,
}

impl From<&TransactionReceipt> for TxOutcome {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
        }
    }
}

/// Map any RPC / contract error into [`AgentError::Chain`]
pub fn chain_err(e: impl std::fmt::Display) -> AgentError {
    AgentError::Chain(e.to_string())
}

/// Parse and validate an EVM address.
///
/// Accepts 40 hex digits with an optional `0x` prefix. Mixed-case input must
/// carry a valid EIP-55 checksum; all-lowercase and all-uppercase input is
/// accepted as-is.
pub fn parse_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AgentError::Validation(format!("Invalid address: {}", value)));
    }

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    let prefixed = format!("0x{}", hex);

    if has_lower && has_upper {
        Address::parse_checksummed(&prefixed, None)
            .map_err(|_| AgentError::Validation(format!("Bad address checksum: {}", value)))
    } else {
        Address::from_str(&prefixed)
            .map_err(|_| AgentError::Validation(format!("Invalid address: {}", value)))
    }
}

/// Parse a configured address, treating empty and zero as "not configured"
pub fn configured_address(value: &str) -> Option<Address> {
    parse_address(value).ok().filter(|a| !a.is_zero())
}
