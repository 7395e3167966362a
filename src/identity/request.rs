//! iden3comm authorization requests
//!
//! A request is shown to the user as a Privado wallet deep link; the wallet
//! answers by POSTing a JWZ token to the request's callback URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::types::Result;

pub const AUTHORIZATION_REQUEST_TYPE: &str =
    "https://iden3-communication.io/authorization/1.0/request";
pub const AUTHORIZATION_RESPONSE_TYPE: &str =
    "https://iden3-communication.io/authorization/1.0/response";
pub const PLAIN_MEDIA_TYPE: &str = "application/iden3comm-plain-json";

/// Privado web wallet; the request is appended as base64 JSON
pub const WALLET_LINK_BASE: &str = "https://wallet.privado.id/#i_m=";

pub const VERIFICATION_REASON: &str = "SynergyAI Human Verification";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub id: String,
    pub typ: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub thid: String,
    pub body: AuthorizationRequestBody,
    pub from: String,
    pub created_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequestBody {
    #[serde(rename = "callbackUrl")]
    pub callback_url: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Proof requests; empty means a plain authentication (authV2) proof
    #[serde(default)]
    pub scope: Vec<serde_json::Value>,
}

impl AuthorizationRequest {
    /// Basic authentication request from `verifier_did`. The thread id equals
    /// the message id so the wallet response can be matched back.
    pub fn new(reason: &str, verifier_did: &str, callback_url: String) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            thid: id.clone(),
            id,
            typ: PLAIN_MEDIA_TYPE.to_string(),
            message_type: AUTHORIZATION_REQUEST_TYPE.to_string(),
            body: AuthorizationRequestBody {
                callback_url,
                reason: reason.to_string(),
                message: None,
                scope: Vec::new(),
            },
            from: verifier_did.to_string(),
            created_time: chrono::Utc::now().timestamp(),
        }
    }

    /// Deep link that opens the request in the Privado wallet
    pub fn deep_link(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}{}", WALLET_LINK_BASE, STANDARD.encode(json)))
    }
}

/// Callback URL the wallet posts its token to
pub fn callback_url(public_url: &str, session_id: &str) -> String {
    format!(
        "{}/identity/callback?sessionId={}",
        public_url.trim_end_matches('/'),
        session_id
    )
}
