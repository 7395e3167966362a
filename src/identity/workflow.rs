//! Human verification workflow
//!
//! `start` issues an authorization request, the wallet answers through
//! `callback`, the UI polls `status`. `complete` is the manual path where a
//! wallet signature stands in for the zero-knowledge proof.
//!
//! On-chain registration is best-effort in both paths: a failed registration
//! is logged and reported through [`RegistrationOutcome`], never as an error.

use std::sync::Arc;

use alloy::hex;
use alloy::primitives::{Address, PrimitiveSignature};
use alloy::signers::local::PrivateKeySigner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::request::{callback_url, AuthorizationRequest, VERIFICATION_REASON};
use super::session::{RegistrationOutcome, VerificationSession, VerificationStore, VerifiedRecord};
use super::verifier::ProofVerifier;
use crate::chain::parse_address;
use crate::registry::{display_trust_score, AgentRegistry, INITIAL_TRUST_SCORE};
use crate::types::{AgentError, Result};

/// Response of `start`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStart {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub wallet: Address,
    pub timestamp: DateTime<Utc>,
    /// Authorization request JSON, rendered as a QR code by the UI
    pub qr_data: String,
    pub verification_link: String,
    pub callback_url: String,
    pub instructions: Vec<&'static str>,
}

/// Response of `callback`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResult {
    pub success: bool,
    pub message: String,
    pub user_did: String,
    pub registration: RegistrationOutcome,
}

/// Response of `status`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VerificationStatus {
    Verified(VerifiedRecord),
    Unverified { verified: bool, pending: bool },
}

/// Body of `complete`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub wallet_address: Option<String>,
    pub signature: Option<String>,
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub agent_wallet_address: Option<String>,
}

/// Response of `complete`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResult {
    pub verified: bool,
    pub human_address: Address,
    pub agent_address: Option<Address>,
    /// 0-100 display scale
    pub trust_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub registration: RegistrationOutcome,
}

impl CompleteResult {
    fn from_record(record: &VerifiedRecord, message: String) -> Self {
        Self {
            verified: record.verified,
            human_address: record.wallet_address,
            agent_address: record.agent_address,
            trust_score: record.trust_score.map(display_trust_score),
            timestamp: record.verified_at,
            message,
            registration: record.registration.clone(),
        }
    }
}

pub struct IdentityWorkflow {
    store: Arc<VerificationStore>,
    verifier: Arc<dyn ProofVerifier>,
    registry: Arc<dyn AgentRegistry>,
    verifier_did: String,
    public_url: String,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl IdentityWorkflow {
    pub fn new(
        store: Arc<VerificationStore>,
        verifier: Arc<dyn ProofVerifier>,
        registry: Arc<dyn AgentRegistry>,
        verifier_did: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            verifier,
            registry,
            verifier_did: verifier_did.into(),
            public_url: public_url.into(),
        }
    }

    pub fn store(&self) -> &Arc<VerificationStore> {
        &self.store
    }

    /// Issue an authorization request for `wallet_address`
    pub fn start(&self, wallet_address: &str) -> Result<VerificationStart> {
        let wallet = parse_address(wallet_address)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let callback = callback_url(&self.public_url, &session_id);

        let request = AuthorizationRequest::new(VERIFICATION_REASON, &self.verifier_did, callback.clone());
        let qr_data = serde_json::to_string(&request)?;
        let verification_link = request.deep_link()?;

        self.store
            .put_session(VerificationSession::new(session_id.clone(), request, wallet));

        info!(session_id = %session_id, wallet = %wallet, "Verification session started");

        Ok(VerificationStart {
            id: session_id,
            kind: "PrivadoIDVerification",
            wallet,
            timestamp: Utc::now(),
            qr_data,
            verification_link,
            callback_url: callback,
            instructions: vec![
                "1. Install the Privado ID wallet app on your phone",
                "2. Create or restore your identity in the wallet",
                "3. Scan the QR code or open the verification link",
                "4. Approve the authentication request in the wallet",
                "5. Return here; verification completes automatically",
            ],
        })
    }

    /// Verify the wallet's JWZ token for a started session
    pub async fn callback(&self, session_id: Option<&str>, token: &str) -> Result<CallbackResult> {
        let session_id = non_empty(session_id)
            .ok_or_else(|| AgentError::Validation("Session ID required".to_string()))?;
        let token = token.trim();
        if token.is_empty() {
            return Err(AgentError::Validation("Token is required".to_string()));
        }

        let session = self
            .store
            .session(session_id)
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))?;

        let identity = self
            .verifier
            .verify(token, &session.auth_request)
            .await
            .map_err(|e| {
                warn!(session_id, error = %e, "Proof verification failed");
                AgentError::from(e)
            })?;

        info!(session_id, did = %identity.user_did, "Proof verified");

        let agent = PrivateKeySigner::random().address();
        let registration = self
            .register(session.wallet_address, agent, INITIAL_TRUST_SCORE)
            .await;
        let registered = registration.is_registered();

        self.store.put_verified(
            session_id,
            VerifiedRecord {
                verified: true,
                user_did: Some(identity.user_did.clone()),
                wallet_address: session.wallet_address,
                agent_address: registered.then_some(agent),
                trust_score: registered.then_some(INITIAL_TRUST_SCORE),
                registration: registration.clone(),
                verified_at: Utc::now(),
            },
        );

        Ok(CallbackResult {
            success: true,
            message: "Verification successful".to_string(),
            user_did: identity.user_did,
            registration,
        })
    }

    /// Verified record, or whether a session is still pending
    pub fn status(&self, session_id: &str) -> VerificationStatus {
        match self.store.verified(session_id) {
            Some(record) => VerificationStatus::Verified(record),
            None => VerificationStatus::Unverified {
                verified: false,
                pending: self.store.has_session(session_id),
            },
        }
    }

    /// Manual completion with an optional wallet signature
    pub async fn complete(&self, request: CompleteRequest) -> Result<CompleteResult> {
        let wallet_str = non_empty(request.wallet_address.as_deref())
            .ok_or_else(|| AgentError::Validation("Invalid wallet address".to_string()))?;
        let wallet = parse_address(wallet_str)?;

        match (
            non_empty(request.signature.as_deref()),
            non_empty(request.message.as_deref()),
        ) {
            (Some(signature), Some(message)) => {
                let recovered = recover_signer(signature, message)?;
                if recovered != wallet {
                    warn!(expected = %wallet, recovered = %recovered, "Signature does not match wallet");
                    return Err(AgentError::SignatureMismatch {
                        expected: wallet.to_string(),
                        recovered: recovered.to_string(),
                    });
                }
                info!(wallet = %wallet, "Wallet signature verified");
            }
            _ => warn!(wallet = %wallet, "Completing verification without a signature"),
        }

        let session_id = non_empty(request.session_id.as_deref());
        if let Some(record) = session_id.and_then(|id| self.store.verified(id)) {
            info!(wallet = %wallet, "Returning cached verification");
            return Ok(CompleteResult::from_record(
                &record,
                "Already verified".to_string(),
            ));
        }

        let agent = match non_empty(request.agent_wallet_address.as_deref()) {
            Some(addr) => parse_address(addr)?,
            None => PrivateKeySigner::random().address(),
        };

        let registration = self.register(wallet, agent, INITIAL_TRUST_SCORE).await;
        let registered = registration.is_registered();
        let record = VerifiedRecord {
            verified: true,
            user_did: None,
            wallet_address: wallet,
            agent_address: registered.then_some(agent),
            trust_score: registered.then_some(INITIAL_TRUST_SCORE),
            registration,
            verified_at: Utc::now(),
        };

        if let Some(id) = session_id {
            self.store.put_verified(id, record.clone());
        }

        let message = if registered {
            "Verification complete, agent registered on-chain"
        } else {
            "Verification complete, on-chain registration pending"
        };
        Ok(CompleteResult::from_record(&record, message.to_string()))
    }

    async fn register(&self, human: Address, agent: Address, score: u32) -> RegistrationOutcome {
        match self.registry.register_agent(human, agent, score).await {
            Ok(tx) => {
                if !tx.success {
                    warn!(human = %human, tx = %tx.tx_hash, "registerAgent reverted");
                }
                RegistrationOutcome::Registered {
                    tx_hash: tx.tx_hash,
                    success: tx.success,
                }
            }
            Err(e @ AgentError::NotInitialized(_)) => {
                warn!(human = %human, "Skipping registration: {}", e);
                RegistrationOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                warn!(human = %human, agent = %agent, error = %e, "Agent registration failed");
                RegistrationOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Recover the EIP-191 (personal_sign) signer of `message`
pub fn recover_signer(signature: &str, message: &str) -> Result<Address> {
    let bytes = hex::decode(signature.trim())
        .map_err(|e| AgentError::InvalidSignature(e.to_string()))?;
    let signature = PrimitiveSignature::try_from(bytes.as_slice())
        .map_err(|e| AgentError::InvalidSignature(e.to_string()))?;
    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|e| AgentError::InvalidSignature(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::SignerSync;

    #[test]
    fn test_recover_signer_roundtrip() {
        let signer = PrivateKeySigner::random();
        let message = "Verify my wallet for SynergyAI";
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        let encoded = hex::encode_prefixed(signature.as_bytes());

        assert_eq!(recover_signer(&encoded, message).unwrap(), signer.address());
        assert_ne!(recover_signer(&encoded, "another message").unwrap(), signer.address());
    }

    #[test]
    fn test_recover_signer_rejects_garbage() {
        assert!(matches!(
            recover_signer("0x1234", "hello"),
            Err(AgentError::InvalidSignature(_))
        ));
        assert!(matches!(
            recover_signer("zz", "hello"),
            Err(AgentError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_unverified_status_json() {
        let status = VerificationStatus::Unverified {
            verified: false,
            pending: true,
        };
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            serde_json::json!({"verified": false, "pending": true})
        );
    }
}
