//! # ClearNode SDK
//!
//! WebSocket session layer for a ClearNode (Yellow Network) state-channel node.
//!
//! ## Architecture
//!
//! The SDK is organized in layers:
//!
//! 1. **Core**: RPC envelope, request ids, channel types, errors
//! 2. **Auth**: Wallet seam plus the `auth_request` / `auth_challenge` / `auth_verify` handshake
//! 3. **WebSocket**: One `tokio-tungstenite` connection task per client: reconnect with
//!    exponential backoff, request/response correlation with timeouts
//! 4. **Status**: Connection/auth state published to callbacks and `watch` receivers
//! 5. **High-Level Client**: `ClearNodeClient` with signed, authenticated helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clearnode_sdk::prelude::*;
//!
//! let mut client = ClearNodeClient::builder()
//!     .url("wss://clearnode.yellow.org")
//!     .wallet(wallet)
//!     .build()?;
//!
//! client.connect().await?;
//! client
//!     .wait_for_status(|s| s.is_authenticated, Duration::from_secs(10))
//!     .await?;
//! let channels = client.get_channels().await?;
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Unified SDK error types.
pub mod error;

/// Network URL constants.
pub mod network;

/// RPC envelope: request ids, methods, requests and inbound messages.
pub mod rpc;

/// Channel and ledger types.
pub mod channel;

// ── Layer 2: Auth ────────────────────────────────────────────────────────────

/// Wallet status and signing, supplied by the host application.
pub mod wallet;

/// Authentication handshake messages.
pub mod auth;

// ── Layer 3: WebSocket ───────────────────────────────────────────────────────

/// WebSocket connection task, configuration and events.
pub mod ws;

// ── Layer 4: Status ──────────────────────────────────────────────────────────

/// Connection status and observers.
pub mod status;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// `ClearNodeClient`, the primary entry point.
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Client
    pub use crate::client::{ClearNodeClient, ClearNodeClientBuilder};

    // Configuration + events
    pub use crate::auth::{Allowance, AuthParams, SessionCredentials};
    pub use crate::ws::{ClientConfig, ClientEvent};

    // Status
    pub use crate::status::{ClientStatus, ConnectionState, StatusSubscription};

    // Wire types
    pub use crate::channel::{Channel, LedgerBalance};
    pub use crate::rpc::{RequestId, RpcMessage, RpcMethod, RpcRequest, RpcResponse};

    // Wallet
    pub use crate::wallet::{Wallet, WalletAccount, WalletStatus};

    // Errors
    pub use crate::error::{AuthError, RequestError, SdkError, WsError};

    // Network
    pub use crate::network::{DEFAULT_CLEARNODE_URL, YELLOW_NETWORK_URL};
}
