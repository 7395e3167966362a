//! Dashboard routes over registry events
//!
//! All of these degrade to an empty payload with a message when no registry
//! contract is configured.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

use super::{error_response, json_response};
use crate::server::AppState;
use crate::services::{summarize_metrics, AgentList, ACTIVITY_LIMIT};
use crate::types::AgentError;

const NOT_INITIALIZED: &str = "Registry not initialized";

pub async fn handle_agents(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.views.agents().await {
        Ok(agents) => json_response(StatusCode::OK, &AgentList::new(agents)),
        Err(AgentError::NotInitialized(_)) => json_response(
            StatusCode::OK,
            &json!({ "agents": [], "count": 0, "message": NOT_INITIALIZED }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_metrics(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.views.metrics().await {
        Ok(metrics) => json_response(StatusCode::OK, &metrics),
        Err(AgentError::NotInitialized(_)) => {
            let mut body = serde_json::to_value(summarize_metrics(&[])).unwrap_or_default();
            body["message"] = json!(NOT_INITIALIZED);
            json_response(StatusCode::OK, &body)
        }
        Err(e) => error_response(&e),
    }
}

/// Liquidity pools are not indexed yet
pub fn handle_pools() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({ "pools": [], "message": "Pool data coming soon" }),
    )
}

pub async fn handle_activity(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.views.activity(ACTIVITY_LIMIT).await {
        Ok(feed) => json_response(StatusCode::OK, &feed),
        Err(AgentError::NotInitialized(_)) => json_response(
            StatusCode::OK,
            &json!({ "activities": [], "count": 0, "message": NOT_INITIALIZED }),
        ),
        Err(e) => error_response(&e),
    }
}
