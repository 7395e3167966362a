//! Verification session store
//!
//! Pending sessions and verified records live in two typed maps keyed by
//! session id. Expired entries are purged lazily on access and by a periodic
//! sweep.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use super::request::AuthorizationRequest;

/// A started verification awaiting the wallet callback
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSession {
    pub session_id: String,
    pub auth_request: AuthorizationRequest,
    pub wallet_address: Address,
    pub created_at: DateTime<Utc>,
}

impl VerificationSession {
    pub fn new(session_id: String, auth_request: AuthorizationRequest, wallet_address: Address) -> Self {
        Self {
            session_id,
            auth_request,
            wallet_address,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of the best-effort on-chain registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RegistrationOutcome {
    Registered {
        #[serde(rename = "txHash")]
        tx_hash: B256,
        success: bool,
    },
    Failed {
        reason: String,
    },
    /// Registry not configured
    Skipped {
        reason: String,
    },
}

impl RegistrationOutcome {
    /// Mined and not reverted
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationOutcome::Registered { success: true, .. })
    }
}

/// Result of a successful verification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedRecord {
    pub verified: bool,
    /// Subject DID; `None` for manual completions
    pub user_did: Option<String>,
    pub wallet_address: Address,
    pub agent_address: Option<Address>,
    /// 0-10000 contract scale
    pub trust_score: Option<u32>,
    pub registration: RegistrationOutcome,
    pub verified_at: DateTime<Utc>,
}

/// Store statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub sessions: usize,
    pub verified: usize,
}

fn is_older_than(created_at: DateTime<Utc>, ttl: Duration) -> bool {
    (Utc::now() - created_at)
        .to_std()
        .map(|age| age >= ttl)
        .unwrap_or(false)
}

/// In-memory store for sessions and verified records
pub struct VerificationStore {
    sessions: DashMap<String, VerificationSession>,
    verified: DashMap<String, VerifiedRecord>,
    session_ttl: Duration,
    verified_ttl: Duration,
}

impl VerificationStore {
    pub fn new(session_ttl: Duration, verified_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            verified: DashMap::new(),
            session_ttl,
            verified_ttl,
        }
    }

    /// Insert or overwrite a session
    pub fn put_session(&self, session: VerificationSession) {
        debug!(session_id = %session.session_id, "Storing verification session");
        self.sessions.insert(session.session_id.clone(), session);
    }

    /// Unexpired session by id
    pub fn session(&self, session_id: &str) -> Option<VerificationSession> {
        let session = self.sessions.get(session_id)?;
        if is_older_than(session.created_at, self.session_ttl) {
            drop(session);
            self.sessions.remove(session_id);
            debug!(session_id, "Purged expired session");
            return None;
        }
        Some(session.clone())
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.session(session_id).is_some()
    }

    /// Insert or overwrite the verified record for a session
    pub fn put_verified(&self, session_id: &str, record: VerifiedRecord) {
        self.verified.insert(session_id.to_string(), record);
    }

    /// Unexpired verified record by session id
    pub fn verified(&self, session_id: &str) -> Option<VerifiedRecord> {
        let record = self.verified.get(session_id)?;
        if is_older_than(record.verified_at, self.verified_ttl) {
            drop(record);
            self.verified.remove(session_id);
            return None;
        }
        Some(record.clone())
    }

    /// Remove expired sessions and records. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let before = self.sessions.len() + self.verified.len();
        self.sessions
            .retain(|_, s| !is_older_than(s.created_at, self.session_ttl));
        self.verified
            .retain(|_, r| !is_older_than(r.verified_at, self.verified_ttl));
        before.saturating_sub(self.sessions.len() + self.verified.len())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            sessions: self.sessions.len(),
            verified: self.verified.len(),
        }
    }
}

/// Start the periodic cleanup task
pub fn spawn_cleanup_task(store: Arc<VerificationStore>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = store.cleanup();
            if removed > 0 {
                debug!("Session cleanup: removed {} expired entries", removed);
            }
            let stats = store.stats();
            debug!(
                "Session stats: {} pending, {} verified",
                stats.sessions, stats.verified
            );
        }
    });
    info!("Session cleanup task started");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> VerificationSession {
        VerificationSession::new(
            id.to_string(),
            AuthorizationRequest::new("test", "did:test", format!("http://cb/{}", id)),
            Address::repeat_byte(0x42),
        )
    }

    fn record() -> VerifiedRecord {
        VerifiedRecord {
            verified: true,
            user_did: Some("did:iden3:polygon:amoy:x".into()),
            wallet_address: Address::repeat_byte(0x42),
            agent_address: None,
            trust_score: None,
            registration: RegistrationOutcome::Skipped {
                reason: "Registry contract not initialized".into(),
            },
            verified_at: Utc::now(),
        }
    }

    #[test]
    fn test_put_and_get() {
        let store = VerificationStore::new(Duration::from_secs(60), Duration::from_secs(60));
        store.put_session(session("a"));
        assert!(store.has_session("a"));
        assert!(!store.has_session("b"));

        let r = record();
        store.put_verified("a", r.clone());
        assert_eq!(store.verified("a"), Some(r));
        assert_eq!(store.stats(), StoreStats { sessions: 1, verified: 1 });
    }

    #[test]
    fn test_expired_session_purged_on_access() {
        let store = VerificationStore::new(Duration::ZERO, Duration::from_secs(60));
        store.put_session(session("a"));
        assert!(store.session("a").is_none());
        assert_eq!(store.stats().sessions, 0);
    }

    #[test]
    fn test_cleanup_counts_removed() {
        let store = VerificationStore::new(Duration::ZERO, Duration::ZERO);
        store.put_session(session("a"));
        store.put_session(session("b"));
        store.put_verified("a", record());
        assert_eq!(store.cleanup(), 3);
        assert_eq!(store.stats(), StoreStats { sessions: 0, verified: 0 });
    }

    #[test]
    fn test_registration_outcome_json() {
        let outcome = RegistrationOutcome::Registered {
            tx_hash: B256::repeat_byte(0xab),
            success: true,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "registered");
        assert_eq!(json["success"], true);
        assert!(json["txHash"].as_str().unwrap().starts_with("0xabab"));
        assert!(outcome.is_registered());

        let skipped = serde_json::to_value(RegistrationOutcome::Skipped { reason: "x".into() }).unwrap();
        assert_eq!(skipped, serde_json::json!({"status": "skipped", "reason": "x"}));
    }
}
