//! Shared fakes for integration tests

#![allow(dead_code)]

use std::sync::Mutex;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;

use synergy_agent::identity::{AuthorizationRequest, ProofVerifier, VerifiedIdentity, VerifyError};
use synergy_agent::registry::{AgentData, AgentRegistry, TxOutcome};
use synergy_agent::{AgentError, Result};

pub const VALID_TOKEN: &str = "header.payload.proof";
pub const USER_DID: &str = "did:iden3:polygon:amoy:x7Z95VkUuyo6mqraJw2VGwCfqTzdqhM1RVjRHzcpK";

/// Accepts exactly [`VALID_TOKEN`]
pub struct FakeVerifier;

#[async_trait]
impl ProofVerifier for FakeVerifier {
    async fn verify(
        &self,
        token: &str,
        _request: &AuthorizationRequest,
    ) -> std::result::Result<VerifiedIdentity, VerifyError> {
        if token == VALID_TOKEN {
            Ok(VerifiedIdentity {
                user_did: USER_DID.to_string(),
                user_id: Default::default(),
                gist_root: Default::default(),
            })
        } else {
            Err(VerifyError::Rejected("bad proof".to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryMode {
    Succeed,
    Revert,
    Fail,
    NotInitialized,
}

/// In-memory registry recording `registerAgent` calls
pub struct FakeRegistry {
    pub mode: RegistryMode,
    pub registrations: Mutex<Vec<(Address, Address, u32)>>,
    pub agent_data_fails: bool,
    pub agent: Address,
    pub score: u32,
    pub verified: bool,
}

impl FakeRegistry {
    pub fn new(mode: RegistryMode) -> Self {
        Self {
            mode,
            registrations: Mutex::new(Vec::new()),
            agent_data_fails: false,
            agent: Address::ZERO,
            score: 0,
            verified: false,
        }
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    fn check(&self) -> Result<()> {
        match self.mode {
            RegistryMode::NotInitialized => Err(AgentError::NotInitialized("Registry contract")),
            RegistryMode::Fail => Err(AgentError::Chain("connection refused".to_string())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AgentRegistry for FakeRegistry {
    async fn register_agent(&self, human: Address, agent: Address, trust_score: u32) -> Result<TxOutcome> {
        self.check()?;
        self.registrations.lock().unwrap().push((human, agent, trust_score));
        Ok(TxOutcome {
            tx_hash: B256::repeat_byte(0xaa),
            success: self.mode == RegistryMode::Succeed,
        })
    }

    async fn update_trust_score(&self, _agent: Address, _new_score: u32) -> Result<TxOutcome> {
        self.check()?;
        Ok(TxOutcome {
            tx_hash: B256::repeat_byte(0xbb),
            success: true,
        })
    }

    async fn agent_of(&self, _human: Address) -> Result<Address> {
        self.check()?;
        Ok(self.agent)
    }

    async fn trust_score(&self, _agent: Address) -> Result<u32> {
        self.check()?;
        Ok(self.score)
    }

    async fn is_verified(&self, _human: Address) -> Result<bool> {
        self.check()?;
        Ok(self.verified)
    }

    async fn agent_data(&self, _human: Address) -> Result<AgentData> {
        self.check()?;
        if self.agent_data_fails {
            return Err(AgentError::Chain("getAgentData reverted".to_string()));
        }
        Ok(AgentData {
            agent: self.agent,
            trust_score: self.score,
            verified: self.verified,
        })
    }
}
