//! Read-side views over the chain

pub mod activity;
pub mod agents;
pub mod portfolio;

pub use activity::{merge_activity, ActivityFeed, ActivityItem, ACTIVITY_LIMIT};
pub use agents::{lookup_human, summarize_metrics, AgentList, AgentSummary, HumanAgentView, PlatformMetrics, RegistryViews};
pub use portfolio::{tracked_tokens, Portfolio, PortfolioService, TrackedToken};
