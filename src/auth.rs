//! Authentication: auth_request / auth_challenge / auth_verify handshake payloads.
//!
//! # Handshake
//!
//! 1. Client sends `auth_request` with the wallet address, app name, scope and expiry
//! 2. Node answers with `auth_challenge { challenge_message }`
//! 3. Client signs the challenge with the wallet and sends `auth_verify`
//! 4. Node answers `auth_success { jwt_token }` or `auth_failure`
//!
//! The state machine lives in the connection task (`ws::native`); this module only
//! builds and parses the messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AuthError;
use crate::rpc::{first_object, RequestId, RpcMethod, RpcRequest};

/// Application-defined parameters for `auth_request`.
#[derive(Debug, Clone)]
pub struct AuthParams {
    pub app_name: String,
    pub scope: String,
    /// How long the requested session stays valid.
    pub session_ttl: Duration,
    /// Application address; the wallet address when `None`.
    pub application: Option<String>,
    pub allowances: Vec<Allowance>,
}

impl Default for AuthParams {
    fn default() -> Self {
        Self {
            app_name: "Admin Dashboard".to_string(),
            scope: "console".to_string(),
            session_ttl: Duration::from_secs(3600),
            application: None,
            allowances: Vec::new(),
        }
    }
}

/// Spending allowance granted to the session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub asset: String,
    pub amount: String,
}

/// Credentials held while the session is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub jwt_token: Option<String>,
    pub account: String,
}

/// Build the unsolicited `auth_request`. The wallet address doubles as session key.
pub fn auth_request(request_id: RequestId, address: &str, params: &AuthParams) -> RpcRequest {
    let expire = chrono::Utc::now().timestamp() + params.session_ttl.as_secs() as i64;
    let application = params.application.as_deref().unwrap_or(address);

    RpcRequest::new(
        request_id,
        RpcMethod::AuthRequest,
        json!([{
            "address": address,
            "session_key": address,
            "app_name": params.app_name,
            "allowances": params.allowances,
            "expire": expire.to_string(),
            "scope": params.scope,
            "application": application,
        }]),
    )
}

/// Build `auth_verify` carrying the signature over the challenge.
pub fn auth_verify(request_id: RequestId, challenge: &AuthChallenge, signature: String) -> RpcRequest {
    RpcRequest::new(
        request_id,
        RpcMethod::AuthVerify,
        json!([{ "challenge": challenge.message }]),
    )
    .with_signature(signature)
}

/// Challenge issued by the node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthChallenge {
    #[serde(rename = "challenge_message", alias = "challenge")]
    pub message: String,
}

impl AuthChallenge {
    pub fn from_payload(payload: &Value) -> Result<Self, AuthError> {
        let object = first_object(payload);
        if let Some(message) = object.as_str() {
            return Ok(Self {
                message: message.to_string(),
            });
        }
        serde_json::from_value(object.clone())
            .map_err(|e| AuthError::InvalidChallenge(e.to_string()))
    }
}

/// What the node said about the verify step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success { jwt_token: Option<String> },
    Failure { reason: String },
}

impl AuthOutcome {
    /// Interpret an auth-related payload. `auth_success` and `auth_failure` are
    /// explicit; an `auth_verify` response carries a `success` flag.
    pub fn from_message(method: &RpcMethod, payload: &Value) -> Option<Self> {
        let object = first_object(payload);
        match method {
            RpcMethod::AuthSuccess => Some(Self::success(object)),
            RpcMethod::AuthFailure => Some(Self::failure(object)),
            RpcMethod::AuthVerify => match object.get("success").and_then(Value::as_bool) {
                Some(true) => Some(Self::success(object)),
                Some(false) => Some(Self::failure(object)),
                None => None,
            },
            _ => None,
        }
    }

    fn success(object: &Value) -> Self {
        Self::Success {
            jwt_token: object
                .get("jwt_token")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    fn failure(object: &Value) -> Self {
        let reason = ["error", "message", "reason"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| object.as_str().map(str::to_string))
            .unwrap_or_else(|| "Authentication failed".to_string());
        Self::Failure { reason }
    }
}
