//! Shared error type for the agent backend

use hyper::StatusCode;

/// Errors surfaced by workflows, clients and route handlers
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Bad input: malformed address, missing field, unparsable body
    #[error("{0}")]
    Validation(String),

    /// A dependent contract or client has not been configured
    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    /// Verification callback for a session that was never started or has expired
    #[error("Invalid or expired session: {0}")]
    SessionNotFound(String),

    /// Recovered signer differs from the claimed wallet
    #[error("Invalid signature - wallet address mismatch (expected {expected}, recovered {recovered})")]
    SignatureMismatch { expected: String, recovered: String },

    /// Signature could not be decoded or recovered
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Zero-knowledge proof rejected
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Price feed unreachable or malformed
    #[error("Price feed error: {0}")]
    PriceFeed(String),

    /// RPC or contract call failure
    #[error("Chain error: {0}")]
    Chain(String),

    /// Startup configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// HTTP status used when a handler surfaces this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AgentError::Validation(_) | AgentError::SessionNotFound(_) => StatusCode::BAD_REQUEST,
            AgentError::SignatureMismatch { .. } | AgentError::InvalidSignature(_) => {
                StatusCode::UNAUTHORIZED
            }
            AgentError::NotInitialized(_) => StatusCode::SERVICE_UNAVAILABLE,
            AgentError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AgentError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AgentError::SignatureMismatch {
                expected: "a".into(),
                recovered: "b".into()
            }
            .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AgentError::PriceFeed("timeout".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AgentError::NotInitialized("Registry contract").to_string(),
            "Registry contract not initialized"
        );
    }
}
