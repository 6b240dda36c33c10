//! Wallet seam: account status and message signing are supplied by the host.
//!
//! The SDK never holds keys. A browser extension, a hardware wallet or a test
//! double implements [`Wallet`] and is injected into the client.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// The connected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub address: String,
    pub balance: Option<String>,
}

impl WalletAccount {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: None,
        }
    }
}

/// Snapshot of the wallet connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletStatus {
    pub is_connected: bool,
    pub account: Option<WalletAccount>,
}

impl WalletStatus {
    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            is_connected: true,
            account: Some(WalletAccount::new(address)),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// The account address, only when the wallet is connected.
    pub fn address(&self) -> Option<&str> {
        if !self.is_connected {
            return None;
        }
        self.account.as_ref().map(|a| a.address.as_str())
    }

    /// Like [`address`](Self::address) but as an error for precondition checks.
    pub fn require_address(&self) -> Result<&str, AuthError> {
        self.address().ok_or(AuthError::WalletNotConnected)
    }
}

/// A connected wallet able to sign messages for its account.
pub trait Wallet: Send + Sync {
    /// Current connection status and account.
    fn status(&self) -> WalletStatus;

    /// Sign `message` with the connected account (e.g. `personal_sign`).
    fn sign_message<'a>(&'a self, message: &'a str) -> BoxFuture<'a, Result<String, AuthError>>;
}
