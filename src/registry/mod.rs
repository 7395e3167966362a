//! SovereignAgentRegistry client
//!
//! Writes go through the operator wallet and wait for one confirmation.
//! Event queries back the agents, metrics and activity views.

use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider};
use async_trait::async_trait;
use tracing::{debug, info};

pub use crate::chain::TxOutcome;
use crate::chain::chain_err;
use crate::chain::contracts::ISovereignAgentRegistry;
use crate::types::{AgentError, Result};

/// Trust score assigned on first registration (0-10000 scale)
pub const INITIAL_TRUST_SCORE: u32 = 8500;

/// Contract scale divisor for display (8500 -> 85.0)
pub const TRUST_SCORE_SCALE: f64 = 100.0;

/// Convert an on-chain score into its display value
pub fn display_trust_score(score: u32) -> f64 {
    score as f64 / TRUST_SCORE_SCALE
}

/// `getAgentData` view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentData {
    pub agent: Address,
    pub trust_score: u32,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRegisteredEvent {
    pub human: Address,
    pub agent_wallet: Address,
    pub initial_trust_score: u32,
    pub timestamp: u64,
    pub tx_hash: Option<B256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustScoreUpdatedEvent {
    pub agent_wallet: Address,
    pub old_score: u32,
    pub new_score: u32,
    pub timestamp: u64,
    pub tx_hash: Option<B256>,
}

/// Registry operations used by the identity workflow
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Bind `agent` to `human` with an initial trust score
    async fn register_agent(&self, human: Address, agent: Address, trust_score: u32)
        -> Result<TxOutcome>;

    async fn update_trust_score(&self, agent: Address, new_score: u32) -> Result<TxOutcome>;

    /// Agent bound to `human` (zero if none)
    async fn agent_of(&self, human: Address) -> Result<Address>;

    async fn trust_score(&self, agent: Address) -> Result<u32>;

    async fn is_verified(&self, human: Address) -> Result<bool>;

    async fn agent_data(&self, human: Address) -> Result<AgentData>;
}

/// Contract-backed registry
pub struct RegistryClient {
    provider: DynProvider,
    address: Option<Address>,
}

impl RegistryClient {
    /// `address` is `None` when no registry has been deployed; every call then
    /// fails with [`AgentError::NotInitialized`].
    pub fn new(provider: DynProvider, address: Option<Address>) -> Self {
        if address.is_none() {
            info!("Registry contract not configured, registry calls are disabled");
        }
        Self { provider, address }
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn is_configured(&self) -> bool {
        self.address.is_some()
    }

    fn require_address(&self) -> Result<Address> {
        self.address
            .ok_or(AgentError::NotInitialized("Registry contract"))
    }

    /// Latest block number of the registry's chain
    pub async fn latest_block(&self) -> Result<u64> {
        self.provider.get_block_number().await.map_err(chain_err)
    }

    /// `AgentRegistered` events from `from_block` to head
    pub async fn registered_events(&self, from_block: u64) -> Result<Vec<AgentRegisteredEvent>> {
        let registry = ISovereignAgentRegistry::new(self.require_address()?, self.provider.clone());
        let logs = registry
            .AgentRegistered_filter()
            .from_block(from_block)
            .query()
            .await
            .map_err(chain_err)?;

        debug!(count = logs.len(), from_block, "Fetched AgentRegistered events");

        Ok(logs
            .into_iter()
            .map(|(event, log)| AgentRegisteredEvent {
                human: event.human,
                agent_wallet: event.agentWallet,
                initial_trust_score: event.initialTrustScore.saturating_to::<u32>(),
                timestamp: event.timestamp.saturating_to::<u64>(),
                tx_hash: log.transaction_hash,
            })
            .collect())
    }

    /// `TrustScoreUpdated` events from `from_block` to head
    pub async fn trust_updated_events(
        &self,
        from_block: u64,
    ) -> Result<Vec<TrustScoreUpdatedEvent>> {
        let registry = ISovereignAgentRegistry::new(self.require_address()?, self.provider.clone());
        let logs = registry
            .TrustScoreUpdated_filter()
            .from_block(from_block)
            .query()
            .await
            .map_err(chain_err)?;

        debug!(count = logs.len(), from_block, "Fetched TrustScoreUpdated events");

        Ok(logs
            .into_iter()
            .map(|(event, log)| TrustScoreUpdatedEvent {
                agent_wallet: event.agentWallet,
                old_score: event.oldScore.saturating_to::<u32>(),
                new_score: event.newScore.saturating_to::<u32>(),
                timestamp: event.timestamp.saturating_to::<u64>(),
                tx_hash: log.transaction_hash,
            })
            .collect())
    }
}

#[async_trait]
impl AgentRegistry for RegistryClient {
    async fn register_agent(
        &self,
        human: Address,
        agent: Address,
        trust_score: u32,
    ) -> Result<TxOutcome> {
        let registry = ISovereignAgentRegistry::new(self.require_address()?, self.provider.clone());

        info!(human = %human, agent = %agent, trust_score, "Submitting registerAgent");

        let receipt = registry
            .registerAgent(human, agent, U256::from(trust_score))
            .send()
            .await
            .map_err(chain_err)?
            .get_receipt()
            .await
            .map_err(chain_err)?;

        let outcome = TxOutcome::from(&receipt);
        info!(tx = %outcome.tx_hash, success = outcome.success, "registerAgent mined");
        Ok(outcome)
    }

    async fn update_trust_score(&self, agent: Address, new_score: u32) -> Result<TxOutcome> {
        let registry = ISovereignAgentRegistry::new(self.require_address()?, self.provider.clone());

        let receipt = registry
            .updateTrustScore(agent, U256::from(new_score))
            .send()
            .await
            .map_err(chain_err)?
            .get_receipt()
            .await
            .map_err(chain_err)?;

        let outcome = TxOutcome::from(&receipt);
        info!(agent = %agent, new_score, tx = %outcome.tx_hash, success = outcome.success, "updateTrustScore mined");
        Ok(outcome)
    }

    async fn agent_of(&self, human: Address) -> Result<Address> {
        let registry = ISovereignAgentRegistry::new(self.require_address()?, self.provider.clone());
        let result = registry.agentOf(human).call().await.map_err(chain_err)?;
        Ok(result.agent)
    }

    async fn trust_score(&self, agent: Address) -> Result<u32> {
        let registry = ISovereignAgentRegistry::new(self.require_address()?, self.provider.clone());
        let result = registry.trustScore(agent).call().await.map_err(chain_err)?;
        Ok(result.score.saturating_to::<u32>())
    }

    async fn is_verified(&self, human: Address) -> Result<bool> {
        let registry = ISovereignAgentRegistry::new(self.require_address()?, self.provider.clone());
        let result = registry.isVerified(human).call().await.map_err(chain_err)?;
        Ok(result.verified)
    }

    async fn agent_data(&self, human: Address) -> Result<AgentData> {
        let registry = ISovereignAgentRegistry::new(self.require_address()?, self.provider.clone());
        let result = registry.getAgentData(human).call().await.map_err(chain_err)?;
        Ok(AgentData {
            agent: result.agent,
            trust_score: result.score.saturating_to::<u32>(),
            verified: result.verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainContext;

    #[test]
    fn test_display_trust_score() {
        assert_eq!(display_trust_score(INITIAL_TRUST_SCORE), 85.0);
        assert_eq!(display_trust_score(0), 0.0);
        assert_eq!(display_trust_score(10_000), 100.0);
    }

    #[tokio::test]
    async fn test_unconfigured_registry_is_not_initialized() {
        let provider = ChainContext::read_only("http://127.0.0.1:1").unwrap();
        let client = RegistryClient::new(provider, None);
        assert!(!client.is_configured());

        let err = client.agent_of(Address::ZERO).await.unwrap_err();
        assert!(matches!(err, AgentError::NotInitialized(_)));

        let err = client
            .register_agent(Address::ZERO, Address::ZERO, INITIAL_TRUST_SCORE)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Registry contract not initialized");
    }
}
