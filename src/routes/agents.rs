//! Per-agent routes
//!
//! - GET  /agents/human/{address}
//! - GET  /agents/{address}/portfolio
//! - POST /agents/{address}/strategies/simple-eth-dip-buyer/run

use alloy::primitives::utils::parse_units;
use alloy::primitives::{Address, U256};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::{error_response, json_response, parse_json_body};
use crate::chain::parse_address;
use crate::server::AppState;
use crate::services::lookup_human;
use crate::strategy::dip_buyer::USDC_DECIMALS;
use crate::strategy::{StrategyParams, StrategyResult, STRATEGY_ID};
use crate::types::{AgentError, Result};

pub async fn handle_human_lookup(state: Arc<AppState>, address: &str) -> Response<Full<Bytes>> {
    let human = match parse_address(address) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };

    match lookup_human(&*state.registry, human).await {
        Ok(view) => json_response(StatusCode::OK, &view),
        Err(AgentError::NotInitialized(_)) => json_response(
            StatusCode::OK,
            &serde_json::json!({
                "humanAddress": human,
                "agentAddress": null,
                "trustScore": 0,
                "verified": false,
                "registered": false,
                "error": "Registry not initialized",
            }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_portfolio(state: Arc<AppState>, address: &str) -> Response<Full<Bytes>> {
    let agent = match parse_address(address) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };

    match state.portfolio.portfolio(agent).await {
        Ok(portfolio) => json_response(StatusCode::OK, &portfolio),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunStrategyRequest {
    amount_in: Option<Value>,
    max_eth_price_usd: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StrategyRunResponse {
    strategy: &'static str,
    agent: Address,
    #[serde(flatten)]
    result: StrategyResult,
    timestamp: DateTime<Utc>,
}

/// Number or numeric string as a decimal string
fn decimal_param(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Validate a strategy request body for `agent`
fn parse_strategy_params(agent: Address, body: &Bytes) -> Result<StrategyParams> {
    let req: RunStrategyRequest = parse_json_body(body)?;
    let missing =
        || AgentError::Validation("Missing required parameters: amountIn, maxEthPriceUsd".to_string());

    let amount = decimal_param(req.amount_in.as_ref()).ok_or_else(missing)?;
    let ceiling = decimal_param(req.max_eth_price_usd.as_ref()).ok_or_else(missing)?;

    if amount.starts_with('-') {
        return Err(AgentError::Validation("amountIn must be positive".to_string()));
    }
    let amount_in = parse_units(&amount, USDC_DECIMALS)
        .map_err(|e| AgentError::Validation(format!("Invalid amountIn {}: {}", amount, e)))?
        .get_absolute();
    if amount_in.is_zero() {
        return Err(AgentError::Validation("amountIn must be positive".to_string()));
    }
    if amount_in > U256::from(u128::MAX) {
        return Err(AgentError::Validation(format!("amountIn {} is too large", amount)));
    }

    let max_eth_price_usd: f64 = ceiling
        .parse()
        .map_err(|_| AgentError::Validation(format!("Invalid maxEthPriceUsd {}", ceiling)))?;
    if !max_eth_price_usd.is_finite() || max_eth_price_usd <= 0.0 {
        return Err(AgentError::Validation(
            "maxEthPriceUsd must be a positive number".to_string(),
        ));
    }

    Ok(StrategyParams {
        agent,
        amount_in,
        max_eth_price_usd,
    })
}

pub async fn handle_run_strategy(
    state: Arc<AppState>,
    address: &str,
    strategy: &str,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    if strategy != STRATEGY_ID {
        return json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({"error": "Not Found", "message": format!("Unknown strategy: {}", strategy)}),
        );
    }

    let params = match parse_address(address).and_then(|agent| parse_strategy_params(agent, body)) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    info!(agent = %params.agent, amount_in = %params.amount_in, ceiling = params.max_eth_price_usd, "Running {}", STRATEGY_ID);
    let result = state.dip_buyer.run(params).await;

    json_response(
        StatusCode::OK,
        &StrategyRunResponse {
            strategy: STRATEGY_ID,
            agent: params.agent,
            result,
            timestamp: Utc::now(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Address {
        Address::repeat_byte(0x33)
    }

    #[test]
    fn test_strategy_params_accept_numbers_and_strings() {
        let params =
            parse_strategy_params(agent(), &Bytes::from_static(br#"{"amountIn": 1000, "maxEthPriceUsd": 3000}"#))
                .unwrap();
        assert_eq!(params.amount_in, U256::from(1_000_000_000u64));
        assert_eq!(params.max_eth_price_usd, 3000.0);

        let params = parse_strategy_params(
            agent(),
            &Bytes::from_static(br#"{"amountIn": "12.5", "maxEthPriceUsd": "2500.5"}"#),
        )
        .unwrap();
        assert_eq!(params.amount_in, U256::from(12_500_000u64));
        assert_eq!(params.max_eth_price_usd, 2500.5);
    }

    #[test]
    fn test_strategy_params_missing_or_invalid() {
        let err = parse_strategy_params(agent(), &Bytes::from_static(br#"{"amountIn": 10}"#)).unwrap_err();
        assert!(err.to_string().contains("Missing required parameters"));

        assert!(parse_strategy_params(
            agent(),
            &Bytes::from_static(br#"{"amountIn": "-5", "maxEthPriceUsd": 3000}"#)
        )
        .is_err());
        assert!(parse_strategy_params(
            agent(),
            &Bytes::from_static(br#"{"amountIn": "abc", "maxEthPriceUsd": 3000}"#)
        )
        .is_err());
        assert!(parse_strategy_params(
            agent(),
            &Bytes::from_static(br#"{"amountIn": 5, "maxEthPriceUsd": 0}"#)
        )
        .is_err());

        let err = parse_strategy_params(
            agent(),
            &Bytes::from_static(
                br#"{"amountIn": "1000000000000000000000000000000000000", "maxEthPriceUsd": 3000}"#,
            ),
        )
        .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
