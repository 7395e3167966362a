//! Registry-backed views: human lookup, agents list and platform metrics

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::registry::{display_trust_score, AgentRegistry, RegistryClient};
use crate::types::{AgentError, Result};

/// `GET /agents/human/{address}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanAgentView {
    pub human_address: Address,
    pub agent_address: Option<Address>,
    pub trust_score: f64,
    pub verified: bool,
    pub registered: bool,
}

/// Agent bound to `human`, via `getAgentData` with a per-field fallback
pub async fn lookup_human(registry: &dyn AgentRegistry, human: Address) -> Result<HumanAgentView> {
    let (agent, score) = match registry.agent_data(human).await {
        Ok(data) => (data.agent, data.trust_score),
        Err(e @ AgentError::NotInitialized(_)) => return Err(e),
        Err(e) => {
            debug!(human = %human, error = %e, "getAgentData failed, falling back to field reads");
            let agent = registry.agent_of(human).await?;
            let score = if agent.is_zero() {
                0
            } else {
                registry.trust_score(agent).await?
            };
            (agent, score)
        }
    };
    let verified = registry.is_verified(human).await?;
    let registered = !agent.is_zero();

    Ok(HumanAgentView {
        human_address: human,
        agent_address: registered.then_some(agent),
        trust_score: display_trust_score(score),
        verified,
        registered,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub human_address: Address,
    pub agent_address: Address,
    /// 0-100 display scale
    pub trust_score: f64,
    pub registered_at: String,
    pub status: &'static str,
    pub tx_hash: Option<B256>,
}

/// `GET /agents` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentList {
    pub agents: Vec<AgentSummary>,
    pub count: usize,
    pub last_updated: DateTime<Utc>,
}

impl AgentList {
    pub fn new(agents: Vec<AgentSummary>) -> Self {
        Self {
            count: agents.len(),
            agents,
            last_updated: Utc::now(),
        }
    }
}

/// `GET /metrics/wave3`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMetrics {
    pub verified_agents: usize,
    pub total_volume: String,
    /// One decimal, 0-100 scale
    pub average_trust_score: String,
    pub active_strategies: usize,
    pub last_updated: DateTime<Utc>,
}

/// Metrics over the registered agents
pub fn summarize_metrics(agents: &[AgentSummary]) -> PlatformMetrics {
    let average = if agents.is_empty() {
        0.0
    } else {
        agents.iter().map(|a| a.trust_score).sum::<f64>() / agents.len() as f64
    };
    PlatformMetrics {
        verified_agents: agents.len(),
        total_volume: "0".to_string(),
        average_trust_score: format!("{:.1}", average),
        active_strategies: agents.len(),
        last_updated: Utc::now(),
    }
}

/// RFC 3339 rendering of an on-chain timestamp
pub fn format_block_time(secs: u64) -> String {
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Event-scanning views over the registry
pub struct RegistryViews {
    pub(crate) registry: Arc<RegistryClient>,
    lookback_blocks: u64,
}

impl RegistryViews {
    pub fn new(registry: Arc<RegistryClient>, lookback_blocks: u64) -> Self {
        Self {
            registry,
            lookback_blocks,
        }
    }

    /// First block of the scan window
    pub(crate) async fn from_block(&self) -> Result<u64> {
        if !self.registry.is_configured() {
            return Err(AgentError::NotInitialized("Registry contract"));
        }
        let latest = self.registry.latest_block().await?;
        Ok(latest.saturating_sub(self.lookback_blocks))
    }

    /// Agents registered inside the scan window, with current trust scores
    pub async fn agents(&self) -> Result<Vec<AgentSummary>> {
        let events = self.registry.registered_events(self.from_block().await?).await?;

        let summaries = events.into_iter().map(|event| async move {
            let score = match self.registry.trust_score(event.agent_wallet).await {
                Ok(score) => score,
                Err(e) => {
                    warn!(agent = %event.agent_wallet, error = %e, "Trust score read failed, using initial score");
                    event.initial_trust_score
                }
            };
            AgentSummary {
                human_address: event.human,
                agent_address: event.agent_wallet,
                trust_score: display_trust_score(score),
                registered_at: format_block_time(event.timestamp),
                status: "active",
                tx_hash: event.tx_hash,
            }
        });

        Ok(join_all(summaries).await)
    }

    pub async fn metrics(&self) -> Result<PlatformMetrics> {
        Ok(summarize_metrics(&self.agents().await?))
    }
}
