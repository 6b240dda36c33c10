//! In-process mock ClearNode and a scripted wallet for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use clearnode_sdk::error::AuthError;
use clearnode_sdk::wallet::{Wallet, WalletStatus};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Mock node ───────────────────────────────────────────────────────────────

enum ServerAction {
    Text(String),
    Close(u16, String),
    Drop,
}

/// One accepted WebSocket connection, driven by the test.
pub struct MockConnection {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<ServerAction>,
}

impl MockConnection {
    /// Next text frame sent by the client.
    pub async fn recv_text(&mut self) -> String {
        timeout(TEST_TIMEOUT, self.inbound.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client connection closed")
    }

    pub async fn recv_json(&mut self) -> Value {
        let text = self.recv_text().await;
        serde_json::from_str(&text).expect("client sent invalid JSON")
    }

    /// Assert the client sends nothing for `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(text)) = timeout(window, self.inbound.recv()).await {
            panic!("expected no client frame, got: {text}");
        }
    }

    /// Wait until the client closes the socket.
    pub async fn wait_closed(&mut self) {
        timeout(TEST_TIMEOUT, async {
            while self.inbound.recv().await.is_some() {}
        })
        .await
        .expect("timed out waiting for the client to close");
    }

    pub fn send_json(&self, value: Value) {
        let _ = self.outbound.send(ServerAction::Text(value.to_string()));
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.outbound.send(ServerAction::Close(code, reason.to_string()));
    }

    /// Drop the TCP connection without a close frame.
    pub fn drop_connection(&self) {
        let _ = self.outbound.send(ServerAction::Drop);
    }
}

pub struct MockNode {
    pub url: String,
    accepts: Arc<Mutex<Vec<Instant>>>,
    reject_handshakes: Arc<AtomicUsize>,
    connections: mpsc::UnboundedReceiver<MockConnection>,
    task: JoinHandle<()>,
}

impl MockNode {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("ws://{}", listener.local_addr().expect("local addr"));

        let accepts = Arc::new(Mutex::new(Vec::new()));
        let reject_handshakes = Arc::new(AtomicUsize::new(0));
        let (conn_tx, connections) = mpsc::unbounded_channel();

        let task = tokio::spawn({
            let accepts = Arc::clone(&accepts);
            let reject_handshakes = Arc::clone(&reject_handshakes);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepts.lock().unwrap().push(Instant::now());

                    let rejected = reject_handshakes
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok();
                    if rejected {
                        drop(stream);
                        continue;
                    }
                    tokio::spawn(serve(stream, conn_tx.clone()));
                }
            }
        });

        Self {
            url,
            accepts,
            reject_handshakes,
            connections,
            task,
        }
    }

    /// Wait for the next completed WebSocket handshake.
    pub async fn next_connection(&mut self) -> MockConnection {
        timeout(TEST_TIMEOUT, self.connections.recv())
            .await
            .expect("timed out waiting for a client connection")
            .expect("mock node stopped")
    }

    /// TCP accepts so far, including rejected handshakes.
    pub fn accept_count(&self) -> usize {
        self.accepts.lock().unwrap().len()
    }

    pub fn accept_times(&self) -> Vec<Instant> {
        self.accepts.lock().unwrap().clone()
    }

    /// Close the next `n` TCP connections before the WebSocket handshake.
    pub fn reject_next_handshakes(&self, n: usize) {
        self.reject_handshakes.store(n, Ordering::SeqCst);
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, connections: mpsc::UnboundedSender<MockConnection>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();
    let (in_tx, inbound) = mpsc::unbounded_channel();
    let (outbound, mut out_rx) = mpsc::unbounded_channel();

    if connections.send(MockConnection { inbound, outbound }).is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = source.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = in_tx.send(text.as_str().to_string());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            action = out_rx.recv() => match action {
                Some(ServerAction::Text(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(ServerAction::Close(code, reason)) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
                Some(ServerAction::Drop) | None => break,
            },
        }
    }
}

// ─── Wallet double ───────────────────────────────────────────────────────────

pub struct TestWallet {
    status: WalletStatus,
    signature: Result<String, AuthError>,
    signed: Mutex<Vec<String>>,
}

impl TestWallet {
    pub fn connected(address: &str, signature: &str) -> Arc<Self> {
        Arc::new(Self {
            status: WalletStatus::connected(address),
            signature: Ok(signature.to_string()),
            signed: Mutex::new(Vec::new()),
        })
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self {
            status: WalletStatus::disconnected(),
            signature: Err(AuthError::WalletNotConnected),
            signed: Mutex::new(Vec::new()),
        })
    }

    /// Connected, but every signature request is refused.
    pub fn refusing(address: &str) -> Arc<Self> {
        Arc::new(Self {
            status: WalletStatus::connected(address),
            signature: Err(AuthError::SigningFailed("user rejected".to_string())),
            signed: Mutex::new(Vec::new()),
        })
    }

    /// Messages passed to the signer, in order.
    pub fn signed(&self) -> Vec<String> {
        self.signed.lock().unwrap().clone()
    }
}

impl Wallet for TestWallet {
    fn status(&self) -> WalletStatus {
        self.status.clone()
    }

    fn sign_message<'a>(&'a self, message: &'a str) -> BoxFuture<'a, Result<String, AuthError>> {
        Box::pin(async move {
            self.signed.lock().unwrap().push(message.to_string());
            self.signature.clone()
        })
    }
}

/// Address of a local port with nothing listening on it.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("ws://{addr}")
}
