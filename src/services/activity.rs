//! Activity feed built from registry events

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::agents::{format_block_time, RegistryViews};
use crate::registry::{display_trust_score, AgentRegisteredEvent, TrustScoreUpdatedEvent};
use crate::types::Result;

/// Entries returned by `GET /activity`
pub const ACTIVITY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    AgentRegistered,
    TrustUpdated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_address: Option<Address>,
    pub agent_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_score: Option<f64>,
    pub timestamp: String,
    pub tx_hash: Option<B256>,
    #[serde(skip)]
    block_time: u64,
}

fn short(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...", &full[..full.len().min(10)])
}

fn event_id(kind: &str, tx_hash: Option<B256>, index: usize) -> String {
    match tx_hash {
        Some(hash) => format!("{}-{}", kind, hash),
        None => format!("{}-{}", kind, index),
    }
}

impl ActivityItem {
    fn registered(event: &AgentRegisteredEvent, index: usize) -> Self {
        Self {
            id: event_id("reg", event.tx_hash, index),
            kind: ActivityKind::AgentRegistered,
            title: "Agent registered".to_string(),
            description: format!(
                "Human {} registered agent {}",
                short(&event.human),
                short(&event.agent_wallet)
            ),
            human_address: Some(event.human),
            agent_address: event.agent_wallet,
            trust_score: Some(display_trust_score(event.initial_trust_score)),
            old_score: None,
            new_score: None,
            timestamp: format_block_time(event.timestamp),
            tx_hash: event.tx_hash,
            block_time: event.timestamp,
        }
    }

    fn trust_updated(event: &TrustScoreUpdatedEvent, index: usize) -> Self {
        let old = display_trust_score(event.old_score);
        let new = display_trust_score(event.new_score);
        Self {
            id: event_id("trust", event.tx_hash, index),
            kind: ActivityKind::TrustUpdated,
            title: "Trust score updated".to_string(),
            description: format!(
                "Agent {} trust score {} -> {}",
                short(&event.agent_wallet),
                old,
                new
            ),
            human_address: None,
            agent_address: event.agent_wallet,
            trust_score: None,
            old_score: Some(old),
            new_score: Some(new),
            timestamp: format_block_time(event.timestamp),
            tx_hash: event.tx_hash,
            block_time: event.timestamp,
        }
    }
}

/// `GET /activity` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFeed {
    pub activities: Vec<ActivityItem>,
    /// Events in the scan window, before truncation
    pub count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Merge both event kinds, newest first, truncated to `limit`
pub fn merge_activity(
    registered: &[AgentRegisteredEvent],
    updated: &[TrustScoreUpdatedEvent],
    limit: usize,
) -> ActivityFeed {
    let mut items: Vec<ActivityItem> = registered
        .iter()
        .enumerate()
        .map(|(i, e)| ActivityItem::registered(e, i))
        .chain(
            updated
                .iter()
                .enumerate()
                .map(|(i, e)| ActivityItem::trust_updated(e, i)),
        )
        .collect();

    items.sort_by(|a, b| b.block_time.cmp(&a.block_time));
    let count = items.len();
    items.truncate(limit);

    ActivityFeed {
        activities: items,
        count,
        last_updated: Utc::now(),
    }
}

impl RegistryViews {
    pub async fn activity(&self, limit: usize) -> Result<ActivityFeed> {
        let from_block = self.from_block().await?;
        let (registered, updated) = futures::try_join!(
            self.registry.registered_events(from_block),
            self.registry.trust_updated_events(from_block),
        )?;
        Ok(merge_activity(&registered, &updated, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(ts: u64) -> AgentRegisteredEvent {
        AgentRegisteredEvent {
            human: Address::repeat_byte(0x11),
            agent_wallet: Address::repeat_byte(0x22),
            initial_trust_score: 8500,
            timestamp: ts,
            tx_hash: Some(B256::repeat_byte(ts as u8)),
        }
    }

    fn updated(ts: u64) -> TrustScoreUpdatedEvent {
        TrustScoreUpdatedEvent {
            agent_wallet: Address::repeat_byte(0x22),
            old_score: 8500,
            new_score: 9000,
            timestamp: ts,
            tx_hash: None,
        }
    }

    #[test]
    fn test_merge_sorts_newest_first() {
        let items = merge_activity(&[registered(10), registered(30)], &[updated(20)], 50).activities;
        let times: Vec<u64> = items.iter().map(|i| i.block_time).collect();
        assert_eq!(times, vec![30, 20, 10]);
        assert_eq!(items[1].kind, ActivityKind::TrustUpdated);
        assert_eq!(items[1].new_score, Some(90.0));
        assert_eq!(items[0].trust_score, Some(85.0));
    }

    #[test]
    fn test_merge_truncates() {
        let regs: Vec<_> = (0..60).map(registered).collect();
        let feed = merge_activity(&regs, &[updated(100)], ACTIVITY_LIMIT);
        assert_eq!(feed.activities.len(), 50);
        assert_eq!(feed.count, 61);
        assert_eq!(feed.activities[0].block_time, 100);
        assert_eq!(feed.activities[1].block_time, 59);

        let json = serde_json::to_value(&feed).unwrap();
        assert_eq!(json["count"], 61);
        assert!(json["lastUpdated"].is_string());
    }

    #[test]
    fn test_item_json_shape() {
        let item = ActivityItem::trust_updated(&updated(5), 0);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "trust_updated");
        assert_eq!(json["id"], "trust-0");
        assert!(json.get("blockTime").is_none());
        assert!(json.get("humanAddress").is_none());
    }
}
