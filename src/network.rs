//! Network URL constants for ClearNode endpoints.

/// Default ClearNode WebSocket URL.
pub const DEFAULT_CLEARNODE_URL: &str = "wss://clearnode.yellow.org";

/// Yellow Network public ClearNet WebSocket URL.
pub const YELLOW_NETWORK_URL: &str = "wss://clearnet.yellow.com/ws";
