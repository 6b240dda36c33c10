//! WebSocket layer: configuration, events, request correlation, connection task.
//!
//! The transport is `tokio-tungstenite` (`native.rs`). One background task per
//! client owns the socket and the pending-request map; the public API talks to
//! it over an mpsc command channel.

pub mod native;
pub mod pending;

use std::time::Duration;

use crate::auth::{AuthParams, SessionCredentials};
use crate::rpc::RpcMessage;

pub use native::WsClient;
pub use pending::PendingRequests;

/// Close code treated as user-initiated; never triggers a reconnect.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Close code reported when the socket dropped without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

// ─── ClientEvent ─────────────────────────────────────────────────────────────

/// Typed events published to every event subscriber.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// An inbound message not consumed by a pending request.
    Message(RpcMessage),
    /// The handshake completed.
    Authenticated(SessionCredentials),
    /// The node rejected the handshake.
    AuthFailure(serde_json::Value),
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Configuration for the connection manager.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    /// Run the auth handshake as soon as the socket opens.
    pub auto_authenticate: bool,
    pub reconnect: bool,
    pub max_reconnect_attempts: u32,
    /// Delay before reconnect attempt 1; doubles each attempt.
    pub reconnect_base_delay: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub command_channel_capacity: usize,
    pub event_channel_capacity: usize,
    pub auth: AuthParams,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::clearnode()
    }
}

impl ClientConfig {
    /// Authenticated ClearNode session.
    pub fn clearnode() -> Self {
        Self {
            url: crate::network::DEFAULT_CLEARNODE_URL.to_string(),
            auto_authenticate: true,
            reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_millis(3000),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            command_channel_capacity: 64,
            event_channel_capacity: 256,
            auth: AuthParams::default(),
        }
    }

    /// Unauthenticated Yellow Network ClearNet feed.
    pub fn yellow_network() -> Self {
        Self {
            url: crate::network::YELLOW_NETWORK_URL.to_string(),
            auto_authenticate: false,
            reconnect_base_delay: Duration::from_millis(5000),
            ..Self::clearnode()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Delay before reconnect attempt `attempt` (1-based): `base × 2^(attempt−1)`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.reconnect_base_delay.saturating_mul(1u32 << exp)
    }
}
