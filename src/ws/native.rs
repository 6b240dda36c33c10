//! Native WebSocket client: `tokio-tungstenite`.
//!
//! Full implementation with:
//! - Background tokio task that owns the socket and the pending-request map
//! - Exponential backoff reconnection, bounded by `max_reconnect_attempts`
//! - Auth handshake (`auth_request` → `auth_challenge` → `auth_verify`) on open
//! - Request/response correlation with per-request deadlines
//! - No outbound queue: sends while the socket is down fail with `NotConnected`

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::auth::{self, AuthChallenge, AuthOutcome, SessionCredentials};
use crate::error::{AuthError, RequestError, SdkError, WsError};
use crate::rpc::{first_object, RequestIdGenerator, RpcMessage, RpcMethod, RpcRequest};
use crate::status::{ConnectionState, StatusBroadcaster};
use crate::wallet::Wallet;
use crate::ws::pending::{PendingRequests, Reply};
use crate::ws::{ClientConfig, ClientEvent, ABNORMAL_CLOSE_CODE, NORMAL_CLOSE_CODE};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Request {
        request: RpcRequest,
        reply: Reply,
    },
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), WsError>>,
    },
    /// Signer finished; tagged with the connection it was started on.
    ChallengeSigned {
        connection_id: u64,
        challenge: AuthChallenge,
        result: Result<String, AuthError>,
    },
    Disconnect,
}

// ─── Disconnect reasons for reconnection decision ────────────────────────────

enum DisconnectReason {
    UserRequested,
    Closed { code: u16, reason: String },
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: ClientConfig,
    wallet: Arc<dyn Wallet>,
    status: Arc<StatusBroadcaster>,
    events: broadcast::Sender<ClientEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    cmd_tx: mpsc::WeakSender<Command>,
    ids: Arc<RequestIdGenerator>,
    pending: PendingRequests,
    reconnect_attempts: u32,
    connection_id: u64,
}

impl TaskState {
    fn connection_state(&self) -> ConnectionState {
        self.status.snapshot().connection_state
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

// ─── Public WsClient ─────────────────────────────────────────────────────────

/// Connection manager and request correlator for one logical ClearNode connection.
///
/// Uses a background tokio task for connection management.
/// The public API communicates with it via mpsc channels.
pub struct WsClient {
    config: ClientConfig,
    wallet: Arc<dyn Wallet>,
    status: Arc<StatusBroadcaster>,
    events: broadcast::Sender<ClientEvent>,
    ids: Arc<RequestIdGenerator>,
    cmd_tx: Option<mpsc::Sender<Command>>,
    task_handle: Option<JoinHandle<()>>,
}

impl WsClient {
    /// Create a new WS client. Does not connect yet.
    pub fn new(config: ClientConfig, wallet: Arc<dyn Wallet>, ids: Arc<RequestIdGenerator>) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            config,
            wallet,
            status: StatusBroadcaster::new(),
            events,
            ids,
            cmd_tx: None,
            task_handle: None,
        }
    }

    /// Start the connection task.
    ///
    /// A no-op while a task is alive (connecting, open, or waiting to reconnect).
    pub async fn connect(&mut self) -> Result<(), WsError> {
        if self.is_running() {
            tracing::debug!("Connection already active, ignoring connect()");
            return Ok(());
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(self.config.command_channel_capacity);

        let state = TaskState {
            config: self.config.clone(),
            wallet: Arc::clone(&self.wallet),
            status: Arc::clone(&self.status),
            events: self.events.clone(),
            cmd_rx,
            cmd_tx: cmd_tx.downgrade(),
            ids: Arc::clone(&self.ids),
            pending: PendingRequests::new(),
            reconnect_attempts: 0,
            connection_id: 0,
        };

        self.cmd_tx = Some(cmd_tx);
        self.status.update(|s| {
            s.connection_state = ConnectionState::Connecting;
            s.error = None;
            s.reconnect_attempt = 0;
        });

        self.task_handle = Some(tokio::spawn(run_task(state)));
        Ok(())
    }

    /// Close with the user-initiated code, reject pending requests, clear the session.
    ///
    /// Idempotent: without a connection task this does nothing.
    pub async fn disconnect(&mut self) {
        let tx = self.cmd_tx.take();
        let handle = self.task_handle.take();
        // A task that already ended has published its final status.
        let running = handle.as_ref().is_some_and(|h| !h.is_finished());
        if !running {
            return;
        }

        if let Some(tx) = tx {
            let _ = tx.send(Command::Disconnect).await;
        }

        if let Some(mut handle) = handle {
            if tokio::time::timeout(Duration::from_secs(5), &mut handle).await.is_err() {
                tracing::warn!("Connection task did not stop in time, aborting");
                handle.abort();
            }
        }

        self.status.update(|s| {
            s.mark_closed();
            s.error = None;
            s.reconnect_attempt = 0;
        });
    }

    /// Send a correlated request and wait for its response.
    ///
    /// Fails fast with `NotConnected` when the socket is not open.
    pub async fn send_correlated(&self, request: RpcRequest) -> Result<Value, SdkError> {
        if !self.is_connected() {
            return Err(WsError::NotConnected.into());
        }
        let tx = self.cmd_tx.as_ref().ok_or(WsError::NotConnected)?;

        let (reply, rx) = oneshot::channel();
        tx.send(Command::Request { request, reply })
            .await
            .map_err(|_| WsError::NotConnected)?;

        rx.await
            .map_err(|_| SdkError::from(RequestError::ConnectionClosed))?
    }

    /// Send a raw text frame without correlation.
    pub async fn send_text(&self, text: String) -> Result<(), WsError> {
        if !self.is_connected() {
            return Err(WsError::NotConnected);
        }
        let tx = self.cmd_tx.as_ref().ok_or(WsError::NotConnected)?;

        let (reply, rx) = oneshot::channel();
        tx.send(Command::Send { text, reply })
            .await
            .map_err(|_| WsError::NotConnected)?;

        rx.await.map_err(|_| WsError::NotConnected)?
    }

    /// Whether a connection task is alive.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Whether the socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.status.snapshot().is_connected
    }

    pub fn status(&self) -> &Arc<StatusBroadcaster> {
        &self.status
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Raw receiver for typed client events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Stream of typed client events, starting from now.
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = ClientEvent> + Send>> {
        let mut rx = self.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event stream lagged, skipped {} event(s)", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState) {
    loop {
        // ── 1. Attempt connection (cancellable by Disconnect) ────────────
        let url = state.config.url.clone();
        let attempt = attempt_connect(&url, state.config.connect_timeout);
        tokio::pin!(attempt);

        let outcome = loop {
            tokio::select! {
                result = &mut attempt => break Some(result),
                cmd = state.cmd_rx.recv() => match cmd {
                    Some(Command::Disconnect) | None => break None,
                    Some(other) => refuse(other),
                },
            }
        };

        let (mut sink, stream) = match outcome {
            None => {
                state.status.update(|s| {
                    s.mark_closed();
                    s.error = None;
                });
                return;
            }
            Some(Ok(parts)) => parts,
            Some(Err(e)) => {
                tracing::error!("WebSocket connection failed: {}", e);
                let message = e.to_string();
                state.status.update(|s| {
                    s.mark_closed();
                    s.connection_state = ConnectionState::Error;
                    s.error = Some(message);
                });
                if backoff(&mut state).await {
                    continue;
                }
                return;
            }
        };

        // ── 2. Connected ─────────────────────────────────────────────────
        state.connection_id += 1;
        state.reconnect_attempts = 0;
        state.status.update(|s| {
            s.connection_state = ConnectionState::Connected;
            s.is_connected = true;
            s.error = None;
            s.reconnect_attempt = 0;
        });
        tracing::info!("Connected to ClearNode at {}", state.config.url);

        // ── 3. Authenticate ──────────────────────────────────────────────
        if state.config.auto_authenticate {
            begin_auth(&mut state, &mut sink).await;
        }

        // ── 4. Inner select! loop ────────────────────────────────────────
        let reason = run_connected(&mut state, sink, stream).await;

        // ── 5. Post-disconnect cleanup and decision ──────────────────────
        let rejected = state.pending.reject_all();
        if rejected > 0 {
            tracing::info!("Rejected {} pending request(s) on close", rejected);
        }
        state.status.update(|s| s.mark_closed());

        match reason {
            DisconnectReason::UserRequested => {
                tracing::info!("Disconnected by user");
                state.status.update(|s| {
                    s.error = None;
                    s.reconnect_attempt = 0;
                });
                return;
            }
            DisconnectReason::Closed { code, reason } => {
                tracing::info!("WebSocket closed: {} {}", code, reason);
                if code == NORMAL_CLOSE_CODE {
                    return;
                }
                let message = WsError::Closed { code, reason }.to_string();
                state.status.update(|s| s.error = Some(message));
                if backoff(&mut state).await {
                    continue;
                }
                return;
            }
        }
    }
}

/// The inner connected loop. Runs until the connection breaks.
async fn run_connected(
    state: &mut TaskState,
    mut sink: WsSink,
    mut stream: WsSource,
) -> DisconnectReason {
    loop {
        let deadline = state.pending.next_deadline();
        let expiry = tokio::time::sleep_until(deadline.unwrap_or_else(far_future));

        tokio::select! {
            // ── a) Incoming WS message ───────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_text(state, text.as_str()),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            tracing::warn!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        return DisconnectReason::Closed { code, reason };
                    }
                    Some(Ok(_)) => {} // Binary, Pong, Frame
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        tracing::error!("WebSocket error: {}", reason);
                        let message = reason.clone();
                        state.status.update(|s| {
                            s.connection_state = ConnectionState::Error;
                            s.error = Some(message);
                        });
                        return DisconnectReason::Closed { code: ABNORMAL_CLOSE_CODE, reason };
                    }
                    None => {
                        return DisconnectReason::Closed {
                            code: ABNORMAL_CLOSE_CODE,
                            reason: "Stream ended".into(),
                        };
                    }
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = state.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Request { request, reply }) => {
                        send_request(state, &mut sink, request, reply).await;
                    }
                    Some(Command::Send { text, reply }) => {
                        let _ = reply.send(send_text(&mut sink, text).await);
                    }
                    Some(Command::ChallengeSigned { connection_id, challenge, result }) => {
                        if connection_id == state.connection_id {
                            finish_auth(state, &mut sink, &challenge, result).await;
                        } else {
                            tracing::debug!("Dropping signature from a previous connection");
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "User initiated disconnect".into(),
                        }))).await;
                        return DisconnectReason::UserRequested;
                    }
                }
            }

            // ── c) Request deadline ──────────────────────────────────────
            () = expiry, if deadline.is_some() => {
                let expired = state.pending.expire(Instant::now());
                tracing::debug!("Expired {} request(s)", expired.len());
            }
        }
    }
}

// ─── Inbound dispatch ────────────────────────────────────────────────────────

fn handle_text(state: &mut TaskState, text: &str) {
    let message = match RpcMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Failed to parse ClearNode message: {} (raw: {})", e, text);
            return;
        }
    };
    tracing::debug!("Received ClearNode message: {:?}", message.method());

    if let RpcMessage::Response(res) = &message {
        if state.pending.contains(&res.request_id) {
            let result: Result<Value, SdkError> = if res.method == RpcMethod::Error {
                let method = state.pending.method(&res.request_id).unwrap_or_default().to_string();
                Err(RequestError::Server {
                    method,
                    message: error_message(&res.result),
                }
                .into())
            } else {
                Ok(res.result.clone())
            };
            state.pending.resolve(&res.request_id, result);
            return;
        }
    }

    match message.method() {
        Some(RpcMethod::AuthChallenge) => on_auth_challenge(state, message.payload()),
        Some(method) => {
            if let Some(outcome) = AuthOutcome::from_message(method, message.payload()) {
                on_auth_outcome(state, outcome, message.payload());
            }
        }
        None => {}
    }

    state.emit(ClientEvent::Message(message));
}

fn error_message(result: &Value) -> String {
    let object = first_object(result);
    object
        .get("error")
        .and_then(Value::as_str)
        .or_else(|| object.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| object.to_string())
}

// ─── Authentication sub-flow ─────────────────────────────────────────────────

async fn begin_auth(state: &mut TaskState, sink: &mut WsSink) {
    state
        .status
        .update(|s| s.connection_state = ConnectionState::Authenticating);

    let wallet_status = state.wallet.status();
    let address = match wallet_status.require_address() {
        Ok(address) => address.to_string(),
        Err(e) => {
            fail_auth(state, e.to_string());
            return;
        }
    };

    let request = auth::auth_request(state.ids.next_id(), &address, &state.config.auth);
    tracing::info!("Sending auth request for {}", address);
    if let Err(e) = send_json(sink, &request).await {
        fail_auth(state, e.to_string());
    }
}

fn on_auth_challenge(state: &mut TaskState, payload: &Value) {
    if state.connection_state() != ConnectionState::Authenticating {
        tracing::warn!("Ignoring auth challenge while {}", state.connection_state());
        return;
    }

    let challenge = match AuthChallenge::from_payload(payload) {
        Ok(challenge) => challenge,
        Err(e) => {
            fail_auth(state, e.to_string());
            return;
        }
    };

    if state.wallet.status().address().is_none() {
        fail_auth(state, AuthError::WalletNotConnected.to_string());
        return;
    }

    let Some(cmd_tx) = state.cmd_tx.upgrade() else {
        return;
    };
    let wallet = Arc::clone(&state.wallet);
    let connection_id = state.connection_id;

    tracing::info!("Received auth challenge, signing");
    tokio::spawn(async move {
        let result = wallet.sign_message(&challenge.message).await;
        let _ = cmd_tx
            .send(Command::ChallengeSigned {
                connection_id,
                challenge,
                result,
            })
            .await;
    });
}

async fn finish_auth(
    state: &mut TaskState,
    sink: &mut WsSink,
    challenge: &AuthChallenge,
    result: Result<String, AuthError>,
) {
    if state.connection_state() != ConnectionState::Authenticating {
        tracing::debug!("Dropping signature, no longer authenticating");
        return;
    }

    let signature = match result {
        Ok(signature) => signature,
        Err(e) => {
            fail_auth(state, e.to_string());
            return;
        }
    };

    let request = auth::auth_verify(state.ids.next_id(), challenge, signature);
    tracing::info!("Sending auth verify");
    if let Err(e) = send_json(sink, &request).await {
        fail_auth(state, e.to_string());
    }
}

fn on_auth_outcome(state: &mut TaskState, outcome: AuthOutcome, payload: &Value) {
    if state.connection_state() != ConnectionState::Authenticating {
        tracing::warn!("Ignoring auth outcome while {}", state.connection_state());
        return;
    }

    match outcome {
        AuthOutcome::Success { jwt_token } => {
            let account = state
                .wallet
                .status()
                .address()
                .unwrap_or_default()
                .to_string();
            let session = SessionCredentials { jwt_token, account };
            tracing::info!("Authentication successful");

            let stored = session.clone();
            state.status.update(|s| {
                s.connection_state = ConnectionState::Authenticated;
                s.is_authenticated = true;
                s.error = None;
                s.session = Some(stored);
            });
            state.emit(ClientEvent::Authenticated(session));
        }
        AuthOutcome::Failure { reason } => {
            fail_auth(state, AuthError::Rejected(reason).to_string());
            state.emit(ClientEvent::AuthFailure(payload.clone()));
        }
    }
}

fn fail_auth(state: &mut TaskState, reason: String) {
    tracing::error!("Authentication error: {}", reason);
    state.status.update(|s| {
        s.connection_state = ConnectionState::Error;
        s.is_authenticated = false;
        s.session = None;
        s.error = Some(reason);
    });
}

// ─── Outbound ────────────────────────────────────────────────────────────────

async fn send_request(state: &mut TaskState, sink: &mut WsSink, request: RpcRequest, reply: Reply) {
    let id = request.request_id().clone();
    let deadline = Instant::now() + state.config.request_timeout;

    if let Err(reply) = state
        .pending
        .insert(id.clone(), request.method().as_str(), reply, deadline)
    {
        let _ = reply.send(Err(RequestError::DuplicateId(id.to_string()).into()));
        return;
    }

    tracing::debug!("Sending {} (id {})", request.method(), id);
    if let Err(e) = send_json(sink, &request).await {
        state.pending.resolve(&id, Err(e.into()));
    }
}

async fn send_json(sink: &mut WsSink, request: &RpcRequest) -> Result<(), WsError> {
    let json = request
        .to_json()
        .map_err(|e| WsError::ProtocolError(e.to_string()))?;
    send_text(sink, json).await
}

async fn send_text(sink: &mut WsSink, text: String) -> Result<(), WsError> {
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| WsError::SendFailed(e.to_string()))
}

/// Reply `NotConnected` to commands that arrive while no socket is open.
fn refuse(cmd: Command) {
    match cmd {
        Command::Request { reply, .. } => {
            let _ = reply.send(Err(WsError::NotConnected.into()));
        }
        Command::Send { reply, .. } => {
            let _ = reply.send(Err(WsError::NotConnected));
        }
        Command::ChallengeSigned { .. } => {
            tracing::debug!("Dropping signature, connection is down");
        }
        Command::Disconnect => {}
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Attempt to establish a WebSocket connection within `timeout`.
async fn attempt_connect(url: &str, timeout: Duration) -> Result<(WsSink, WsSource), WsError> {
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| WsError::ConnectionFailed("Connection timeout".into()))?
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    Ok(ws_stream.split())
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.as_str().to_string()),
        None => (ABNORMAL_CLOSE_CODE, "No close frame".into()),
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400)
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

/// Wait out the next reconnect delay. Returns `false` when no further attempt
/// should be made (disabled, cap reached, or disconnect requested meanwhile).
async fn backoff(state: &mut TaskState) -> bool {
    if !state.config.reconnect {
        return false;
    }

    let max = state.config.max_reconnect_attempts;
    if state.reconnect_attempts >= max {
        tracing::error!("Maximum reconnection attempts reached ({})", max);
        let message = WsError::MaxReconnectAttempts(max).to_string();
        state.status.update(|s| {
            s.connection_state = ConnectionState::Error;
            s.error = Some(message);
            s.reconnect_attempt = 0;
        });
        return false;
    }

    state.reconnect_attempts += 1;
    let attempt = state.reconnect_attempts;
    let delay = state.config.reconnect_delay(attempt);

    tracing::info!(
        "Attempting to reconnect in {}ms ({}/{})",
        delay.as_millis(),
        attempt,
        max
    );
    state.status.update(|s| s.reconnect_attempt = attempt);

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => break,
            cmd = state.cmd_rx.recv() => match cmd {
                Some(Command::Disconnect) | None => {
                    state.status.update(|s| {
                        s.mark_closed();
                        s.error = None;
                        s.reconnect_attempt = 0;
                    });
                    return false;
                }
                Some(other) => refuse(other),
            },
        }
    }

    state
        .status
        .update(|s| s.connection_state = ConnectionState::Connecting);
    true
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::WalletStatus;
    use futures_util::future::BoxFuture;

    struct NoWallet;

    impl Wallet for NoWallet {
        fn status(&self) -> WalletStatus {
            WalletStatus::disconnected()
        }

        fn sign_message<'a>(&'a self, _message: &'a str) -> BoxFuture<'a, Result<String, AuthError>> {
            Box::pin(async { Err(AuthError::WalletNotConnected) })
        }
    }

    fn client() -> WsClient {
        WsClient::new(
            ClientConfig::default(),
            Arc::new(NoWallet),
            Arc::new(RequestIdGenerator::starting_at(1)),
        )
    }

    #[test]
    fn test_ws_client_new() {
        let client = client();
        assert!(client.cmd_tx.is_none());
        assert!(!client.is_running());
        assert_eq!(
            client.status().snapshot().connection_state,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn test_send_when_not_connected() {
        let client = client();
        let result = client
            .send_correlated(RpcRequest::new("r1", RpcMethod::GetConfig, Value::Null))
            .await;
        assert!(matches!(result, Err(SdkError::Ws(WsError::NotConnected))));

        let result = client.send_text("{}".into()).await;
        assert_eq!(result, Err(WsError::NotConnected));
    }

    #[tokio::test]
    async fn test_disconnect_when_not_connected_is_noop() {
        let mut client = client();
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let _sub = client.status().subscribe(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_extract_close_with_frame() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "goodbye".into(),
        };
        let (code, reason) = extract_close(Some(&frame));
        assert_eq!(code, NORMAL_CLOSE_CODE);
        assert_eq!(reason, "goodbye");
    }

    #[test]
    fn test_extract_close_no_frame() {
        let (code, reason) = extract_close(None);
        assert_eq!(code, ABNORMAL_CLOSE_CODE);
        assert_eq!(reason, "No close frame");
    }

    #[test]
    fn test_error_message_prefers_error_field() {
        assert_eq!(error_message(&serde_json::json!([{"error": "bad"}])), "bad");
        assert_eq!(error_message(&serde_json::json!("plain")), "plain");
        assert_eq!(error_message(&serde_json::json!({"code": 3})), r#"{"code":3}"#);
    }

    #[test]
    fn test_refuse_replies_not_connected() {
        let (reply, mut rx) = oneshot::channel();
        refuse(Command::Request {
            request: RpcRequest::new("x", RpcMethod::GetConfig, Value::Null),
            reply,
        });
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(SdkError::Ws(WsError::NotConnected))
        ));
    }
}
