//! High-level client: `ClearNodeClient` over the WebSocket connection task.
//!
//! Adds the precondition checks (connected, authenticated, wallet) and request
//! signing on top of [`WsClient`], plus the status observer API.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, watch};

use crate::channel::{self, Channel, LedgerBalance};
use crate::error::{AuthError, SdkError, WsError};
use crate::rpc::{timestamp_ms, RequestIdGenerator, RpcMethod, RpcRequest};
use crate::status::{ClientStatus, ConnectionState, StatusSubscription};
use crate::wallet::Wallet;
use crate::ws::{ClientConfig, ClientEvent, WsClient};

/// Session client for a ClearNode (or the Yellow Network feed).
///
/// Explicitly constructed with its wallet and config; `connect()` / `disconnect()`
/// are the lifecycle and dropping the client stops the connection task.
pub struct ClearNodeClient {
    ws: WsClient,
    wallet: Arc<dyn Wallet>,
    ids: Arc<RequestIdGenerator>,
}

impl ClearNodeClient {
    pub fn builder() -> ClearNodeClientBuilder {
        ClearNodeClientBuilder::default()
    }

    pub fn new(config: ClientConfig, wallet: Arc<dyn Wallet>) -> Self {
        let ids = Arc::new(RequestIdGenerator::new());
        Self {
            ws: WsClient::new(config, Arc::clone(&wallet), Arc::clone(&ids)),
            wallet,
            ids,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Open the connection. A no-op while connecting or connected.
    pub async fn connect(&mut self) -> Result<(), SdkError> {
        Ok(self.ws.connect().await?)
    }

    /// Close the connection and stop reconnecting. A no-op without a connection.
    pub async fn disconnect(&mut self) {
        self.ws.disconnect().await;
    }

    /// Tear the connection down and open a fresh one.
    pub async fn reconnect(&mut self) -> Result<(), SdkError> {
        self.disconnect().await;
        self.connect().await
    }

    pub fn config(&self) -> &ClientConfig {
        self.ws.config()
    }

    // ── Status ───────────────────────────────────────────────────────────

    pub fn get_status(&self) -> ClientStatus {
        self.ws.status().snapshot()
    }

    /// Register a callback invoked on every status change.
    pub fn on_status_change<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(&ClientStatus) + Send + Sync + 'static,
    {
        self.ws.status().subscribe(callback)
    }

    pub fn status_watch(&self) -> watch::Receiver<ClientStatus> {
        self.ws.status().watch()
    }

    /// Wait until the status satisfies `predicate`, or fail after `timeout`.
    pub async fn wait_for_status(
        &self,
        predicate: impl FnMut(&ClientStatus) -> bool,
        timeout: Duration,
    ) -> Result<ClientStatus, SdkError> {
        let mut rx = self.status_watch();
        let status = tokio::time::timeout(timeout, rx.wait_for(predicate))
            .await
            .map_err(|_| SdkError::Other(format!("Timed out after {:?} waiting for status", timeout)))?
            .map_err(|_| SdkError::Other("Status channel closed".to_string()))?
            .clone();
        Ok(status)
    }

    // ── Events ───────────────────────────────────────────────────────────

    pub fn events(&self) -> Pin<Box<dyn Stream<Item = ClientEvent> + Send>> {
        self.ws.events()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.ws.subscribe_events()
    }

    // ── Requests ─────────────────────────────────────────────────────────

    /// Send a prepared request and wait for the correlated response.
    pub async fn send_correlated(&self, request: RpcRequest) -> Result<Value, SdkError> {
        self.ws.send_correlated(request).await
    }

    /// Signed, authenticated request. Fails with `NotAuthenticated` before any I/O
    /// unless the session is authenticated.
    pub async fn request(
        &self,
        method: impl Into<RpcMethod>,
        params: Value,
    ) -> Result<Value, SdkError> {
        let status = self.get_status();
        if status.connection_state != ConnectionState::Authenticated || !status.is_authenticated {
            return Err(AuthError::NotAuthenticated.into());
        }
        self.wallet.status().require_address()?;

        let request = RpcRequest::new(self.ids.next_id(), method, params);
        let payload = request.signing_payload()?;
        let signature = self.wallet.sign_message(&payload).await?;

        self.ws.send_correlated(request.with_signature(signature)).await
    }

    pub async fn get_channels(&self) -> Result<Vec<Channel>, SdkError> {
        let participant = self.wallet_address()?;
        let result = self
            .request(RpcMethod::GetChannels, json!([{ "participant": participant }]))
            .await?;
        channel::parse_channels(result)
    }

    pub async fn get_ledger_balances(&self, account_id: &str) -> Result<Vec<LedgerBalance>, SdkError> {
        let result = self
            .request(RpcMethod::GetLedgerBalances, json!([{ "account_id": account_id }]))
            .await?;
        channel::parse_ledger_balances(result)
    }

    pub async fn get_config(&self) -> Result<Value, SdkError> {
        self.request(RpcMethod::GetConfig, json!([])).await
    }

    // ── Uncorrelated messages ────────────────────────────────────────────

    /// Send arbitrary JSON without correlation.
    pub async fn send_message(&self, message: &Value) -> Result<(), SdkError> {
        let text = serde_json::to_string(message)?;
        Ok(self.ws.send_text(text).await?)
    }

    /// Sign `message` with the wallet, add `signature` and `signer`, and send it.
    /// Returns the message as sent.
    pub async fn send_signed_message(&self, message: Value) -> Result<Value, SdkError> {
        if !self.ws.is_connected() {
            return Err(WsError::NotConnected.into());
        }
        let signer = self.wallet_address()?;

        let signature = self
            .wallet
            .sign_message(&serde_json::to_string(&message)?)
            .await?;

        let mut fields = match message {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.insert("signature".to_string(), Value::String(signature));
        fields.insert("signer".to_string(), Value::String(signer));
        let signed = Value::Object(fields);

        self.send_message(&signed).await?;
        tracing::debug!("Sent signed message: {}", signed);
        Ok(signed)
    }

    /// Create an app session with a signed `app_session_create` message.
    pub async fn create_app_session(&self) -> Result<Value, SdkError> {
        let address = self.wallet_address()?;
        let now = timestamp_ms();
        let message = json!({
            "id": now,
            "method": RpcMethod::AppSessionCreate.as_str(),
            "params": { "address": address, "timestamp": now },
        });

        let signed = self.send_signed_message(message).await?;
        tracing::info!("Created app session for {}", address);
        Ok(signed)
    }

    fn wallet_address(&self) -> Result<String, AuthError> {
        self.wallet.status().require_address().map(str::to_string)
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct ClearNodeClientBuilder {
    config: ClientConfig,
    wallet: Option<Arc<dyn Wallet>>,
}

impl ClearNodeClientBuilder {
    pub fn url(mut self, url: &str) -> Self {
        self.config.url = url.to_string();
        self
    }

    /// Replace the whole config (keeps nothing from earlier `url()` calls).
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn build(self) -> Result<ClearNodeClient, SdkError> {
        let wallet = self
            .wallet
            .ok_or_else(|| SdkError::Validation("a wallet is required".to_string()))?;
        if self.config.url.is_empty() {
            return Err(SdkError::Validation("url must not be empty".to_string()));
        }
        Ok(ClearNodeClient::new(self.config, wallet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::WalletStatus;
    use futures_util::future::BoxFuture;

    struct StaticWallet(WalletStatus);

    impl Wallet for StaticWallet {
        fn status(&self) -> WalletStatus {
            self.0.clone()
        }

        fn sign_message<'a>(&'a self, _message: &'a str) -> BoxFuture<'a, Result<String, AuthError>> {
            Box::pin(async { Ok("0xSIG".to_string()) })
        }
    }

    fn client(status: WalletStatus) -> ClearNodeClient {
        ClearNodeClient::builder()
            .url("ws://127.0.0.1:1")
            .wallet(Arc::new(StaticWallet(status)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_wallet() {
        let result = ClearNodeClient::builder().build();
        assert!(matches!(result, Err(SdkError::Validation(_))));
    }

    #[test]
    fn test_builder_rejects_empty_url() {
        let result = ClearNodeClient::builder()
            .url("")
            .wallet(Arc::new(StaticWallet(WalletStatus::disconnected())))
            .build();
        assert!(matches!(result, Err(SdkError::Validation(_))));
    }

    #[test]
    fn test_builder_config_preset() {
        let client = ClearNodeClient::builder()
            .config(ClientConfig::yellow_network())
            .wallet(Arc::new(StaticWallet(WalletStatus::disconnected())))
            .build()
            .unwrap();
        assert!(!client.config().auto_authenticate);
        assert_eq!(client.get_status().connection_state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_request_requires_authentication() {
        let client = client(WalletStatus::connected("0xabc"));
        let err = client.get_channels().await.unwrap_err();
        assert!(matches!(err, SdkError::Auth(AuthError::NotAuthenticated)));

        let err = client.get_config().await.unwrap_err();
        assert!(matches!(err, SdkError::Auth(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_get_channels_requires_wallet() {
        let client = client(WalletStatus::disconnected());
        let err = client.get_channels().await.unwrap_err();
        assert!(matches!(err, SdkError::Auth(AuthError::WalletNotConnected)));
    }

    #[tokio::test]
    async fn test_send_message_when_not_connected() {
        let client = client(WalletStatus::connected("0xabc"));
        let err = client.send_message(&json!({"ping": 1})).await.unwrap_err();
        assert!(matches!(err, SdkError::Ws(WsError::NotConnected)));

        let err = client.send_signed_message(json!({"ping": 1})).await.unwrap_err();
        assert!(matches!(err, SdkError::Ws(WsError::NotConnected)));
    }

    #[tokio::test]
    async fn test_wait_for_status_times_out() {
        let client = client(WalletStatus::connected("0xabc"));
        let result = client
            .wait_for_status(|s| s.is_authenticated, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(SdkError::Other(_))));

        let status = client
            .wait_for_status(|s| !s.is_connected, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(status.connection_state, ConnectionState::Disconnected);
    }
}
