//! Request correlation: pending requests keyed by id, each with a deadline.
//!
//! Owned by the connection task. Every entry leaves the map exactly once:
//! resolved by a response, expired by its deadline, or rejected on close.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{RequestError, SdkError};
use crate::rpc::RequestId;

/// Reply channel for a correlated request.
pub type Reply = oneshot::Sender<Result<Value, SdkError>>;

struct PendingRequest {
    method: String,
    reply: Reply,
    deadline: Instant,
}

#[derive(Default)]
pub struct PendingRequests {
    requests: HashMap<RequestId, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.requests.contains_key(id)
    }

    /// Track a request. Hands the reply back if `id` is already pending.
    pub fn insert(
        &mut self,
        id: RequestId,
        method: impl Into<String>,
        reply: Reply,
        deadline: Instant,
    ) -> Result<(), Reply> {
        if self.requests.contains_key(&id) {
            return Err(reply);
        }
        self.requests.insert(
            id,
            PendingRequest {
                method: method.into(),
                reply,
                deadline,
            },
        );
        Ok(())
    }

    /// Complete the request for `id`. Returns `false` for unknown (e.g. expired) ids.
    pub fn resolve(&mut self, id: &RequestId, result: Result<Value, SdkError>) -> bool {
        match self.requests.remove(id) {
            Some(pending) => {
                if pending.reply.send(result).is_err() {
                    tracing::debug!("Caller dropped request {} before its response", id);
                }
                true
            }
            None => false,
        }
    }

    /// Method name of a pending request.
    pub fn method(&self, id: &RequestId) -> Option<&str> {
        self.requests.get(id).map(|p| p.method.as_str())
    }

    /// Earliest deadline among pending requests.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.requests.values().map(|p| p.deadline).min()
    }

    /// Reject every request whose deadline is at or before `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<RequestId> {
        let expired: Vec<RequestId> = self
            .requests
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(pending) = self.requests.remove(id) {
                tracing::warn!("Request timeout for {} (id {})", pending.method, id);
                let _ = pending.reply.send(Err(RequestError::Timeout {
                    request_id: id.to_string(),
                    method: pending.method,
                }
                .into()));
            }
        }
        expired
    }

    /// Reject everything with "connection closed". Returns how many were rejected.
    pub fn reject_all(&mut self) -> usize {
        let count = self.requests.len();
        for (_, pending) in self.requests.drain() {
            let _ = pending.reply.send(Err(RequestError::ConnectionClosed.into()));
        }
        count
    }
}
