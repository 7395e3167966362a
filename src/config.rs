//! Configuration for the agent backend
//!
//! CLI arguments and environment variable handling using clap. Every
//! option can be supplied through the environment (or a `.env` file loaded
//! by `main`).

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default Privado ID verifier DID (audience of authorization requests)
pub const DEFAULT_VERIFIER_DID: &str =
    "did:iden3:privado:main:2ShVftBmNha7XccjvM6L6fT3Q6xDp7CJaSoGYKABut";

/// Placeholder used by the deployment scripts for "not deployed yet"
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// SynergyAI agent backend
#[derive(Parser, Debug, Clone)]
#[command(name = "synergy-agent")]
#[command(about = "Agent backend: identity verification, registry and strategies")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3001")]
    pub listen: SocketAddr,

    /// Public URL of this backend, used to build verifier callback URLs.
    /// Must be reachable from the wallet (ngrok in development).
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Katana JSON-RPC endpoint
    #[arg(long, env = "KATANA_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Hex private key of the agent operator wallet (signs all transactions)
    #[arg(long, env = "AGENT_PRIVATE_KEY", hide_env_values = true)]
    pub agent_private_key: Option<String>,

    /// SovereignAgentRegistry contract address
    #[arg(long, env = "REGISTRY_CONTRACT_ADDRESS")]
    pub registry_contract_address: Option<String>,

    /// Sushi V2 router address on Katana
    #[arg(long, env = "SUSHI_ROUTER_ADDRESS", default_value = ZERO_ADDRESS)]
    pub sushi_router_address: String,

    /// ETH/USD price feed (CoinGecko simple/price compatible)
    #[arg(
        long,
        env = "PRICE_FEED_URL",
        default_value = "https://api.coingecko.com/api/v3/simple/price"
    )]
    pub price_feed_url: String,

    /// Price feed request timeout in milliseconds
    #[arg(long, env = "PRICE_FEED_TIMEOUT_MS", default_value = "5000")]
    pub price_feed_timeout_ms: u64,

    /// Verifier DID used as the audience of authorization requests
    #[arg(long, env = "PRIVADO_VERIFIER_DID", default_value = DEFAULT_VERIFIER_DID)]
    pub privado_verifier_did: String,

    /// vbUSDC token address (6 decimals)
    #[arg(long, env = "VBUSDC_TOKEN_ADDRESS", default_value = ZERO_ADDRESS)]
    pub vbusdc_token_address: String,

    /// WETH token address (18 decimals)
    #[arg(long, env = "WETH_TOKEN_ADDRESS", default_value = ZERO_ADDRESS)]
    pub weth_token_address: String,

    /// KAT token address (18 decimals)
    #[arg(long, env = "KAT_TOKEN_ADDRESS", default_value = ZERO_ADDRESS)]
    pub kat_token_address: String,

    /// How long a started verification stays claimable, in seconds
    #[arg(long, env = "SESSION_TTL_SECS", default_value = "1800")]
    pub session_ttl_secs: u64,

    /// How long verified results stay queryable, in seconds
    #[arg(long, env = "VERIFIED_TTL_SECS", default_value = "86400")]
    pub verified_ttl_secs: u64,

    /// Number of blocks scanned backwards for registry events
    #[arg(long, env = "EVENT_LOOKBACK_BLOCKS", default_value = "10000")]
    pub event_lookback_blocks: u64,

    /// Directory holding circuit verification keys (`authV2.json`)
    #[arg(long, env = "CIRCUITS_DIR", default_value = "keys")]
    pub circuits_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// Public base URL for callbacks (falls back to localhost on the listen port)
    pub fn public_url(&self) -> String {
        match self.backend_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://localhost:{}", self.listen.port()),
        }
    }

    /// Registry address if one has been deployed
    pub fn registry_address(&self) -> Option<&str> {
        self.registry_contract_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && *a != ZERO_ADDRESS)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        match self.rpc_url.as_deref().map(str::trim) {
            None | Some("") => errors.push("KATANA_RPC_URL is required".to_string()),
            Some(url) => {
                if reqwest::Url::parse(url).is_err() {
                    errors.push(format!("KATANA_RPC_URL is not a valid URL: {}", url));
                }
            }
        }

        let key_len = self
            .agent_private_key
            .as_deref()
            .map(|k| k.trim().trim_start_matches("0x").len())
            .unwrap_or(0);
        if key_len < 64 {
            errors.push(
                "AGENT_PRIVATE_KEY is required and must be a valid private key".to_string(),
            );
        }

        if self.price_feed_timeout_ms == 0 {
            errors.push("PRICE_FEED_TIMEOUT_MS must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}
