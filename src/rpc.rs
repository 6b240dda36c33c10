//! ClearNode RPC envelope: request ids, methods, outbound requests, inbound messages.
//!
//! Outbound: `{ "req": [id, method, params, timestamp], "sig": [..] }`
//! Inbound:  `{ "res": [id, method, result, timestamp] }` or `{ "method": .., "params": .. }`

use std::sync::atomic::{AtomicU64, Ordering};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::WsError;

/// Milliseconds since the Unix epoch.
pub(crate) fn timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// ─── Request id ──────────────────────────────────────────────────────────────

/// Identifier that pairs an outbound request with its response.
///
/// The node echoes whatever it was sent, so both numeric and string ids are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// Monotonic id source. Seeded from the wall clock so ids stay unique across restarts.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(timestamp_ms())
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> RequestId {
        RequestId::Number(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Methods ─────────────────────────────────────────────────────────────────

/// RPC method names understood by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    AuthRequest,
    AuthChallenge,
    AuthVerify,
    AuthSuccess,
    AuthFailure,
    GetChannels,
    GetLedgerBalances,
    GetConfig,
    AppSessionCreate,
    Error,
    Other(String),
}

impl RpcMethod {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthRequest => "auth_request",
            Self::AuthChallenge => "auth_challenge",
            Self::AuthVerify => "auth_verify",
            Self::AuthSuccess => "auth_success",
            Self::AuthFailure => "auth_failure",
            Self::GetChannels => "get_channels",
            Self::GetLedgerBalances => "get_ledger_balances",
            Self::GetConfig => "get_config",
            Self::AppSessionCreate => "app_session_create",
            Self::Error => "error",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for RpcMethod {
    fn from(name: &str) -> Self {
        match name {
            "auth_request" => Self::AuthRequest,
            "auth_challenge" => Self::AuthChallenge,
            "auth_verify" => Self::AuthVerify,
            "auth_success" => Self::AuthSuccess,
            "auth_failure" => Self::AuthFailure,
            "get_channels" => Self::GetChannels,
            "get_ledger_balances" => Self::GetLedgerBalances,
            "get_config" => Self::GetConfig,
            "app_session_create" => Self::AppSessionCreate,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Outbound ────────────────────────────────────────────────────────────────

/// A request in the node's `req` envelope, optionally carrying signatures.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    request_id: RequestId,
    method: RpcMethod,
    params: Value,
    timestamp: u64,
    signatures: Vec<String>,
}

impl RpcRequest {
    /// Build an unsigned request stamped with the current time.
    pub fn new(request_id: impl Into<RequestId>, method: impl Into<RpcMethod>, params: Value) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            params,
            timestamp: timestamp_ms(),
            signatures: Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signatures.push(signature.into());
        self
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn method(&self) -> &RpcMethod {
        &self.method
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    /// The exact string a signer signs: the JSON of the `req` array.
    pub fn signing_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.req())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn req(&self) -> (&RequestId, &str, &Value, u64) {
        (&self.request_id, self.method.as_str(), &self.params, self.timestamp)
    }
}

impl Serialize for RpcRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("req", &self.req())?;
        map.serialize_entry("sig", &self.signatures)?;
        map.end()
    }
}

// ─── Inbound ─────────────────────────────────────────────────────────────────

/// A response in the node's `res` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub request_id: RequestId,
    pub method: RpcMethod,
    pub result: Value,
    pub timestamp: Option<u64>,
}

impl RpcResponse {
    fn from_envelope(items: &[Value]) -> Result<Self, WsError> {
        let id = items
            .first()
            .ok_or_else(|| WsError::ProtocolError("empty res envelope".into()))?;
        let request_id: RequestId = serde_json::from_value(id.clone())
            .map_err(|e| WsError::ProtocolError(format!("bad request id: {}", e)))?;
        let method = items
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| WsError::ProtocolError("res envelope without method".into()))?;

        Ok(Self {
            request_id,
            method: RpcMethod::from(method),
            result: items.get(2).cloned().unwrap_or(Value::Null),
            timestamp: items.get(3).and_then(Value::as_u64),
        })
    }
}

/// Any message received from the node.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    /// Reply to a request (`res` envelope).
    Response(RpcResponse),
    /// Unsolicited `{ method, params }` notification.
    Notification { method: RpcMethod, params: Value },
    /// Valid JSON in neither shape.
    Other(Value),
}

impl RpcMessage {
    pub fn parse(text: &str) -> Result<Self, WsError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| WsError::ProtocolError(format!("invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, WsError> {
        if let Some(res) = value.get("res") {
            let items = res
                .as_array()
                .ok_or_else(|| WsError::ProtocolError("res is not an array".into()))?;
            return RpcResponse::from_envelope(items).map(Self::Response);
        }

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            return Ok(Self::Notification {
                method: RpcMethod::from(method),
                params: value.get("params").cloned().unwrap_or(Value::Null),
            });
        }

        Ok(Self::Other(value))
    }

    pub fn method(&self) -> Option<&RpcMethod> {
        match self {
            Self::Response(res) => Some(&res.method),
            Self::Notification { method, .. } => Some(method),
            Self::Other(_) => None,
        }
    }

    /// The `result` of a response or the `params` of a notification.
    pub fn payload(&self) -> &Value {
        match self {
            Self::Response(res) => &res.result,
            Self::Notification { params, .. } => params,
            Self::Other(value) => value,
        }
    }
}

/// Node payloads are often wrapped in a one-element array; unwrap it.
pub(crate) fn first_object(payload: &Value) -> &Value {
    match payload {
        Value::Array(items) if !items.is_empty() => &items[0],
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_to_req_envelope() {
        let request = RpcRequest::new("r1", RpcMethod::GetChannels, json!([{"participant": "0xabc"}]))
            .with_timestamp(42)
            .with_signature("0xSIG");

        let value: Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "req": ["r1", "get_channels", [{"participant": "0xabc"}], 42],
                "sig": ["0xSIG"]
            })
        );
    }

    #[test]
    fn test_signing_payload_is_req_array() {
        let request = RpcRequest::new(7u64, "get_config", json!([])).with_timestamp(1);
        assert_eq!(request.signing_payload().unwrap(), r#"[7,"get_config",[],1]"#);
    }

    #[test]
    fn test_parse_response_with_string_id() {
        let msg = RpcMessage::parse(
            r#"{"res":["r1","get_channels",[{"channel_id":"c1","status":"open"}]]}"#,
        )
        .unwrap();

        match msg {
            RpcMessage::Response(res) => {
                assert_eq!(res.request_id, RequestId::from("r1"));
                assert_eq!(res.method, RpcMethod::GetChannels);
                assert_eq!(res.result, json!([{"channel_id": "c1", "status": "open"}]));
                assert_eq!(res.timestamp, None);
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_with_numeric_id_and_timestamp() {
        let msg = RpcMessage::parse(r#"{"res":[17,"auth_challenge",[{"challenge_message":"x"}],99]}"#)
            .unwrap();
        let RpcMessage::Response(res) = msg else {
            panic!("expected response");
        };
        assert_eq!(res.request_id, RequestId::Number(17));
        assert_eq!(res.method, RpcMethod::AuthChallenge);
        assert_eq!(res.timestamp, Some(99));
    }

    #[test]
    fn test_parse_notification() {
        let msg = RpcMessage::parse(r#"{"method":"auth_success","params":{"jwt_token":"abc"}}"#)
            .unwrap();
        assert_eq!(msg.method(), Some(&RpcMethod::AuthSuccess));
        assert_eq!(msg.payload(), &json!({"jwt_token": "abc"}));
    }

    #[test]
    fn test_parse_other_and_invalid() {
        let msg = RpcMessage::parse(r#"{"hello":"world"}"#).unwrap();
        assert!(matches!(msg, RpcMessage::Other(_)));
        assert_eq!(msg.method(), None);

        assert!(RpcMessage::parse("not json").is_err());
        assert!(RpcMessage::parse(r#"{"res":[]}"#).is_err());
        assert!(RpcMessage::parse(r#"{"res":"nope"}"#).is_err());
    }

    #[test]
    fn test_unknown_method_round_trips_name() {
        let method = RpcMethod::from("bu");
        assert_eq!(method, RpcMethod::Other("bu".into()));
        assert_eq!(method.to_string(), "bu");
    }

    #[test]
    fn test_id_generator_is_monotonic() {
        let ids = RequestIdGenerator::starting_at(10);
        assert_eq!(ids.next_id(), RequestId::Number(10));
        assert_eq!(ids.next_id(), RequestId::Number(11));
    }

    #[test]
    fn test_first_object_unwraps_single_array() {
        assert_eq!(first_object(&json!([{"a": 1}])), &json!({"a": 1}));
        assert_eq!(first_object(&json!({"a": 1})), &json!({"a": 1}));
        assert_eq!(first_object(&json!([])), &json!([]));
    }
}
