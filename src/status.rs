//! Connection status and its broadcaster.
//!
//! Every state mutation in the connection task goes through
//! [`StatusBroadcaster::update`], which stores the new snapshot and synchronously
//! invokes every registered callback with an immutable copy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;
use tokio::sync::watch;

use crate::auth::SessionCredentials;

/// Lifecycle of the connection and its authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Authenticated,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable status snapshot handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub connection_state: ConnectionState,
    pub is_connected: bool,
    pub is_authenticated: bool,
    pub error: Option<String>,
    pub session: Option<SessionCredentials>,
    /// Reconnect attempt currently scheduled or in flight (0 when none).
    pub reconnect_attempt: u32,
}

impl Default for ClientStatus {
    fn default() -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            is_connected: false,
            is_authenticated: false,
            error: None,
            session: None,
            reconnect_attempt: 0,
        }
    }
}

impl ClientStatus {
    pub fn jwt_token(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.jwt_token.as_deref())
    }

    /// Drop everything tied to the current socket.
    pub(crate) fn mark_closed(&mut self) {
        self.connection_state = ConnectionState::Disconnected;
        self.is_connected = false;
        self.is_authenticated = false;
        self.session = None;
    }
}

/// Status observer callback.
pub type StatusCallback = Arc<dyn Fn(&ClientStatus) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: StatusCallback,
}

/// Holds the current status and the registered observers.
pub struct StatusBroadcaster {
    current: watch::Sender<ClientStatus>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl StatusBroadcaster {
    pub fn new() -> Arc<Self> {
        let (current, _) = watch::channel(ClientStatus::default());
        Arc::new(Self {
            current,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Current status (a copy).
    pub fn snapshot(&self) -> ClientStatus {
        self.current.borrow().clone()
    }

    /// Receiver for async observers.
    pub fn watch(&self) -> watch::Receiver<ClientStatus> {
        self.current.subscribe()
    }

    /// Register `callback`; it runs on every status change until unsubscribed.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> StatusSubscription
    where
        F: Fn(&ClientStatus) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_subscribers().push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        StatusSubscription {
            id,
            broadcaster: Arc::downgrade(self),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Apply `mutate` to the status and notify every subscriber.
    pub(crate) fn update(&self, mutate: impl FnOnce(&mut ClientStatus)) {
        self.current.send_modify(mutate);
        self.emit();
    }

    fn emit(&self) {
        let snapshot = self.snapshot();
        // Callbacks run without the lock so they may (un)subscribe.
        let callbacks: Vec<StatusCallback> = self
            .lock_subscribers()
            .iter()
            .map(|s| Arc::clone(&s.callback))
            .collect();
        for callback in callbacks {
            callback(&snapshot);
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by [`StatusBroadcaster::subscribe`].
#[must_use = "dropping the handle keeps the callback registered; call unsubscribe() to remove it"]
pub struct StatusSubscription {
    id: u64,
    broadcaster: Weak<StatusBroadcaster>,
}

impl StatusSubscription {
    /// Remove the callback. Returns `false` if it was already removed.
    pub fn unsubscribe(&self) -> bool {
        match self.broadcaster.upgrade() {
            Some(broadcaster) => broadcaster.remove(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSubscription").field("id", &self.id).finish()
    }
}
