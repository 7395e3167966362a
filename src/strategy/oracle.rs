//! ETH/USD price source

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::types::{AgentError, Result};

/// Spot ETH price in USD
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn eth_usd_price(&self) -> Result<f64>;
}

/// CoinGecko `simple/price` response: `{"ethereum": {"usd": 3000.12}}`
#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    ethereum: Option<UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<f64>,
}

/// Price oracle backed by a CoinGecko-compatible HTTP endpoint
pub struct HttpPriceOracle {
    url: String,
    http_client: reqwest::Client,
}

impl HttpPriceOracle {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("synergy-agent/0.1")
            .build()
            .unwrap_or_default();

        Self {
            url: url.into(),
            http_client,
        }
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn eth_usd_price(&self) -> Result<f64> {
        let response = self
            .http_client
            .get(&self.url)
            .query(&[("ids", "ethereum"), ("vs_currencies", "usd")])
            .send()
            .await
            .map_err(|e| AgentError::PriceFeed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError::PriceFeed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: SimplePriceResponse = response
            .json()
            .await
            .map_err(|e| AgentError::PriceFeed(e.to_string()))?;

        let price = body
            .ethereum
            .and_then(|q| q.usd)
            .ok_or_else(|| AgentError::PriceFeed("missing ethereum.usd".to_string()))?;

        if !price.is_finite() || price <= 0.0 {
            return Err(AgentError::PriceFeed(format!("invalid price {}", price)));
        }

        debug!(price, "Fetched ETH/USD price");
        Ok(price)
    }
}
