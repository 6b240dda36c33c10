//! Unified SDK error types.

use thiserror::Error;

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// WebSocket / transport errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WsError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Connection closed: code={code} reason={reason}")]
    Closed { code: u16, reason: String },

    #[error("Maximum reconnection attempts reached ({0})")]
    MaxReconnectAttempts(u32),
}

/// Authentication errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Wallet is not connected")]
    WalletNotConnected,

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Authentication rejected: {0}")]
    Rejected(String),

    #[error("Invalid auth challenge: {0}")]
    InvalidChallenge(String),
}

/// Errors scoped to a single correlated request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Request timeout for {method} (id {request_id})")]
    Timeout { request_id: String, method: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request id {0} is already pending")]
    DuplicateId(String),

    #[error("Server error for {method}: {message}")]
    Server { method: String, message: String },
}

impl SdkError {
    /// Whether this error is a correlated-request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SdkError::Request(RequestError::Timeout { .. }))
    }

    /// Whether this error was caused by the connection going away.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, SdkError::Request(RequestError::ConnectionClosed))
    }
}
