//! Identity verification routes
//!
//! - POST /identity/start         `{ walletAddress }`
//! - POST /identity/callback      `?sessionId=...`, raw JWZ token body
//! - GET  /identity/status/{id}
//! - POST /identity/complete      `{ walletAddress, signature?, message?, sessionId?, agentWalletAddress? }`

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use super::{error_response, json_response, parse_json_body};
use crate::identity::CompleteRequest;
use crate::server::AppState;
use crate::types::AgentError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Session id from the callback query string
fn callback_session_id(query: Option<&str>) -> Option<String> {
    serde_urlencoded::from_str::<CallbackQuery>(query.unwrap_or(""))
        .ok()
        .and_then(|q| q.session_id)
}

pub fn handle_start(state: Arc<AppState>, body: &Bytes) -> Response<Full<Bytes>> {
    let result = parse_json_body::<StartRequest>(body).and_then(|req| {
        let wallet = req
            .wallet_address
            .ok_or_else(|| AgentError::Validation("Invalid wallet address".to_string()))?;
        state.identity.start(&wallet)
    });

    match result {
        Ok(start) => json_response(StatusCode::OK, &start),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_callback(
    state: Arc<AppState>,
    query: Option<&str>,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    let session_id = callback_session_id(query);
    let token = String::from_utf8_lossy(body);

    match state
        .identity
        .callback(session_id.as_deref(), &token)
        .await
    {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(e) => {
            warn!(session_id = ?session_id, error = %e, "Verification callback rejected");
            error_response(&e)
        }
    }
}

pub fn handle_status(state: Arc<AppState>, session_id: &str) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.identity.status(session_id))
}

pub async fn handle_complete(state: Arc<AppState>, body: &Bytes) -> Response<Full<Bytes>> {
    let request = match parse_json_body::<CompleteRequest>(body) {
        Ok(req) => req,
        Err(e) => return error_response(&e),
    };

    match state.identity.complete(request).await {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_session_id() {
        assert_eq!(
            callback_session_id(Some("sessionId=abc-123&x=1")).as_deref(),
            Some("abc-123")
        );
        assert_eq!(callback_session_id(Some("other=1")), None);
        assert_eq!(callback_session_id(None), None);
    }
}
