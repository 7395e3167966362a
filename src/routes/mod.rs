//! HTTP routes for the agent backend

pub mod activity;
pub mod agents;
pub mod health;
pub mod identity;

pub use activity::{handle_activity, handle_agents, handle_metrics, handle_pools};
pub use agents::{handle_human_lookup, handle_portfolio, handle_run_strategy};
pub use health::{health_check, version_info};
pub use identity::{handle_callback, handle_complete, handle_start, handle_status};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::AgentError;

// =============================================================================
// Response Helpers
// =============================================================================

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// `{ error, message }` with the status mapped from the error
pub(crate) fn error_response(err: &AgentError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    json_response(
        status,
        &serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": err.to_string(),
        }),
    )
}

/// Parse a JSON body; an empty body reads as `{}`
pub(crate) fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AgentError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(raw)
        .map_err(|e| AgentError::Validation(format!("Invalid JSON body: {}", e)))
}
