//! JWZ authorization response verification (iden3 authV2)
//!
//! The wallet answers an authorization request with a JWZ token:
//! `base64url(header).base64url(payload).base64url(proof)`. Verification
//! binds the response to the stored request, checks that the proof commits to
//! the token's own header and payload, runs the Groth16 pairing check against
//! the authV2 verification key, binds the proof's public signals to the sender
//! DID, and checks the proven GIST root against the State contract of the
//! DID's network.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::DynProvider;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use super::groth16::{message_challenge, CircuitKey, SnarkjsProof};
use super::request::{AuthorizationRequest, AUTHORIZATION_RESPONSE_TYPE};
use crate::chain::contracts::IState;
use crate::chain::ChainContext;
use crate::types::{AgentError, Result};

pub const GROTH16: &str = "groth16";
pub const AUTH_V2_CIRCUIT: &str = "authV2";

/// How long a replaced GIST root is still accepted
pub const ACCEPTED_STATE_TRANSITION_DELAY: Duration = Duration::from_secs(5 * 60);

/// `(network, rpc url, State contract)` for the supported DID networks
pub const DEFAULT_STATE_RESOLVERS: &[(&str, &str, &str)] = &[
    (
        "privado:main",
        "https://rpc-mainnet.privado.id",
        "0x3C9acB2205Aa72A05F6D77d708b5Cf85FCa3a896",
    ),
    (
        "polygon:amoy",
        "https://rpc-amoy.polygon.technology",
        "0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124",
    ),
    (
        "polygon:main",
        "https://polygon-rpc.com",
        "0x624ce98D2d27b20b8f8d521723Df8fC4db71D79D",
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("{0}")]
    Rejected(String),

    #[error("unsupported DID network: {0}")]
    UnsupportedNetwork(String),

    #[error("state resolution failed: {0}")]
    StateResolution(String),

    #[error("GIST root {0} is not known to the State contract")]
    UnknownGistRoot(U256),

    #[error("GIST root {0} was replaced more than {1}s ago")]
    GistRootExpired(U256, u64),
}

impl From<VerifyError> for AgentError {
    fn from(e: VerifyError) -> Self {
        AgentError::Verification(e.to_string())
    }
}

/// Identity proven by a verified response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_did: String,
    pub user_id: U256,
    pub gist_root: U256,
}

#[async_trait]
pub trait ProofVerifier: Send + Sync {
    async fn verify(
        &self,
        token: &str,
        request: &AuthorizationRequest,
    ) -> std::result::Result<VerifiedIdentity, VerifyError>;
}

/// GIST root state as published on chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GistRootState {
    pub root: U256,
    pub created_at: u64,
    /// Zero while the root is current
    pub replaced_at: u64,
}

#[async_trait]
pub trait StateResolver: Send + Sync {
    async fn gist_root_info(&self, root: U256) -> std::result::Result<GistRootState, VerifyError>;
}

/// Resolver reading `getGISTRootInfo` from a State contract
pub struct ContractStateResolver {
    provider: DynProvider,
    contract: Address,
}

impl ContractStateResolver {
    pub fn new(rpc_url: &str, contract: Address) -> Result<Self> {
        Ok(Self {
            provider: ChainContext::read_only(rpc_url)?,
            contract,
        })
    }
}

#[async_trait]
impl StateResolver for ContractStateResolver {
    async fn gist_root_info(&self, root: U256) -> std::result::Result<GistRootState, VerifyError> {
        let state = IState::new(self.contract, self.provider.clone());
        let info = state
            .getGISTRootInfo(root)
            .call()
            .await
            .map_err(|e| VerifyError::StateResolution(e.to_string()))?
            .info;

        Ok(GistRootState {
            root: info.root,
            created_at: info.createdAtTimestamp.saturating_to::<u64>(),
            replaced_at: info.replacedAtTimestamp.saturating_to::<u64>(),
        })
    }
}

// =============================================================================
// Token model
// =============================================================================

#[derive(Debug, Deserialize)]
struct JwzHeader {
    alg: String,
    #[serde(rename = "circuitId")]
    circuit_id: String,
}

/// iden3comm authorization response (the JWZ payload)
#[derive(Debug, Deserialize)]
pub struct AuthorizationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub thid: Option<String>,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZkProof {
    proof: SnarkjsProof,
    pub_signals: Vec<String>,
}

/// Decoded JWZ parts
struct Jwz {
    header: JwzHeader,
    payload: AuthorizationResponse,
    proof: ZkProof,
    /// `header.payload` exactly as received; the proof's challenge commits to it
    signing_input: String,
}

fn decode_part<T: DeserializeOwned>(part: &str, name: &str) -> std::result::Result<T, VerifyError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part.trim_end_matches('='))
        .map_err(|e| VerifyError::Malformed(format!("{} is not base64url: {}", name, e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| VerifyError::Malformed(format!("{} is not valid JSON: {}", name, e)))
}

impl Jwz {
    fn parse(token: &str) -> std::result::Result<Self, VerifyError> {
        let parts: Vec<&str> = token.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(VerifyError::Malformed(format!(
                "expected 3 segments, got {}",
                parts.len()
            )));
        }
        Ok(Self {
            header: decode_part(parts[0], "header")?,
            payload: decode_part(parts[1], "payload")?,
            proof: decode_part(parts[2], "proof")?,
            signing_input: format!("{}.{}", parts[0], parts[1]),
        })
    }
}

/// authV2 public signals, in circuit order
struct AuthV2Signals {
    user_id: U256,
    challenge: U256,
    gist_root: U256,
}

impl AuthV2Signals {
    fn from_proof(proof: &ZkProof) -> std::result::Result<Self, VerifyError> {
        if proof.proof.protocol != GROTH16 {
            return Err(VerifyError::Rejected(format!(
                "unsupported proof protocol {}",
                proof.proof.protocol
            )));
        }
        let [user_id, challenge, gist_root] = proof.pub_signals.as_slice() else {
            return Err(VerifyError::Rejected(format!(
                "authV2 expects 3 public signals, got {}",
                proof.pub_signals.len()
            )));
        };
        Ok(Self {
            user_id: parse_signal(user_id)?,
            challenge: parse_signal(challenge)?,
            gist_root: parse_signal(gist_root)?,
        })
    }

    fn as_inputs(&self) -> [U256; 3] {
        [self.user_id, self.challenge, self.gist_root]
    }
}

fn parse_signal(value: &str) -> std::result::Result<U256, VerifyError> {
    U256::from_str_radix(value, 10)
        .map_err(|_| VerifyError::Malformed(format!("public signal {} is not a decimal integer", value)))
}

// =============================================================================
// DID helpers
// =============================================================================

/// `<blockchain>:<network>` segment of a DID, e.g. `polygon:amoy`
pub fn did_network(did: &str) -> Option<String> {
    let parts: Vec<&str> = did.split(':').collect();
    match parts.as_slice() {
        ["did", _method, blockchain, network, _id] => Some(format!("{}:{}", blockchain, network)),
        _ => None,
    }
}

/// Identity id of a DID as the little-endian integer used in public signals
pub fn did_identity_id(did: &str) -> std::result::Result<U256, VerifyError> {
    let id = did
        .rsplit(':')
        .next()
        .filter(|s| did.starts_with("did:") && !s.is_empty())
        .ok_or_else(|| VerifyError::Malformed(format!("invalid DID {}", did)))?;

    let bytes = bs58::decode(id)
        .into_vec()
        .map_err(|e| VerifyError::Malformed(format!("DID id is not base58: {}", e)))?;

    // 2 bytes type, 27 bytes genesis state, 2 bytes checksum
    if bytes.len() != 31 {
        return Err(VerifyError::Malformed(format!(
            "DID id must be 31 bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[29..] != id_checksum(&bytes[..29]) {
        return Err(VerifyError::Malformed(format!("DID id {} has a bad checksum", id)));
    }
    Ok(U256::from_le_slice(&bytes))
}

/// Wrapping byte sum of type and genesis state, little-endian
fn id_checksum(type_and_genesis: &[u8]) -> [u8; 2] {
    type_and_genesis
        .iter()
        .fold(0u16, |sum, b| sum.wrapping_add(u16::from(*b)))
        .to_le_bytes()
}

/// Check a GIST root against its on-chain state at `now` (unix seconds)
pub fn check_gist_root(
    state: &GistRootState,
    root: U256,
    now: u64,
    accepted_delay: Duration,
) -> std::result::Result<(), VerifyError> {
    if state.root != root || state.created_at == 0 {
        return Err(VerifyError::UnknownGistRoot(root));
    }
    if state.replaced_at != 0 && now.saturating_sub(state.replaced_at) > accepted_delay.as_secs() {
        return Err(VerifyError::GistRootExpired(root, accepted_delay.as_secs()));
    }
    Ok(())
}

/// Verifier for authV2 responses across the configured networks.
/// Without a verification key every response is rejected.
pub struct Iden3Verifier {
    resolvers: HashMap<String, Arc<dyn StateResolver>>,
    auth_v2_key: Option<CircuitKey>,
    accepted_delay: Duration,
}

impl Iden3Verifier {
    pub fn new(
        resolvers: HashMap<String, Arc<dyn StateResolver>>,
        auth_v2_key: Option<CircuitKey>,
    ) -> Self {
        Self {
            resolvers,
            auth_v2_key,
            accepted_delay: ACCEPTED_STATE_TRANSITION_DELAY,
        }
    }

    /// Verifier with the built-in Privado / Polygon resolvers
    pub fn with_default_resolvers(auth_v2_key: Option<CircuitKey>) -> Result<Self> {
        let mut resolvers: HashMap<String, Arc<dyn StateResolver>> = HashMap::new();
        for (network, rpc_url, contract) in DEFAULT_STATE_RESOLVERS {
            let contract = Address::from_str(&contract.to_ascii_lowercase())
                .map_err(|e| AgentError::Config(format!("State contract for {}: {}", network, e)))?;
            resolvers.insert(
                network.to_string(),
                Arc::new(ContractStateResolver::new(rpc_url, contract)?),
            );
        }
        info!(
            networks = resolvers.len(),
            key_loaded = auth_v2_key.is_some(),
            "Proof verifier initialized"
        );
        Ok(Self::new(resolvers, auth_v2_key))
    }
}

fn check_response(
    response: &AuthorizationResponse,
    request: &AuthorizationRequest,
) -> std::result::Result<(), VerifyError> {
    if response.message_type != AUTHORIZATION_RESPONSE_TYPE {
        return Err(VerifyError::Rejected(format!(
            "unexpected message type {}",
            response.message_type
        )));
    }
    if response.thid.as_deref() != Some(request.thid.as_str()) {
        return Err(VerifyError::Rejected(
            "response thread id does not match the request".to_string(),
        ));
    }
    if let Some(to) = response.to.as_deref() {
        if to != request.from {
            return Err(VerifyError::Rejected(format!(
                "response addressed to {} instead of {}",
                to, request.from
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl ProofVerifier for Iden3Verifier {
    async fn verify(
        &self,
        token: &str,
        request: &AuthorizationRequest,
    ) -> std::result::Result<VerifiedIdentity, VerifyError> {
        let jwz = Jwz::parse(token)?;

        if jwz.header.alg != GROTH16 || jwz.header.circuit_id != AUTH_V2_CIRCUIT {
            return Err(VerifyError::Rejected(format!(
                "unsupported token {} / {}",
                jwz.header.alg, jwz.header.circuit_id
            )));
        }

        check_response(&jwz.payload, request)?;

        let signals = AuthV2Signals::from_proof(&jwz.proof)?;

        let key = self.auth_v2_key.as_ref().ok_or_else(|| {
            VerifyError::Rejected("authV2 verification key not loaded".to_string())
        })?;
        if signals.challenge != message_challenge(jwz.signing_input.as_bytes())? {
            return Err(VerifyError::Rejected(
                "proof challenge does not match the token message".to_string(),
            ));
        }
        key.verify(&jwz.proof.proof, &signals.as_inputs())?;

        let user_did = jwz.payload.from;
        let user_id = did_identity_id(&user_did)?;
        if signals.user_id != user_id {
            return Err(VerifyError::Rejected(
                "proof userID does not match the sender DID".to_string(),
            ));
        }

        let network = did_network(&user_did)
            .ok_or_else(|| VerifyError::UnsupportedNetwork(user_did.clone()))?;
        let resolver = self
            .resolvers
            .get(&network)
            .ok_or_else(|| VerifyError::UnsupportedNetwork(network.clone()))?;

        let state = resolver.gist_root_info(signals.gist_root).await?;
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        check_gist_root(&state, signals.gist_root, now, self.accepted_delay)?;

        debug!(did = %user_did, network = %network, "Authorization response verified");

        Ok(VerifiedIdentity {
            user_did,
            user_id,
            gist_root: signals.gist_root,
        })
    }
}
