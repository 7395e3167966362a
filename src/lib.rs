//! SynergyAI agent backend
//!
//! HTTP backend that verifies humans with Privado ID, binds an agent wallet
//! to each verified human in the SovereignAgentRegistry contract and runs
//! trading strategies on the agents' behalf.
//!
//! ## Services
//!
//! - **Identity**: authorization requests, JWZ callback verification, status polling
//! - **Registry**: agent registration, trust scores, event queries
//! - **Strategy**: price-gated vbUSDC -> WETH dip buyer
//! - **Views**: portfolio balances, agents list, metrics and activity feed

pub mod chain;
pub mod config;
pub mod identity;
pub mod registry;
pub mod routes;
pub mod server;
pub mod services;
pub mod strategy;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AgentError, Result};
