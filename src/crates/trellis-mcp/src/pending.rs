//! Pending tool-call table: request id -> completion primitive.

use crate::protocol::RpcError;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

/// Outcome delivered to a waiting caller.
pub type ToolOutcome = std::result::Result<Value, RpcError>;

/// Concurrent map of in-flight tool calls, keyed by JSON-RPC id.
#[derive(Debug, Default)]
pub struct PendingRequests {
    waiters: DashMap<String, oneshot::Sender<ToolOutcome>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`; the returned receiver resolves when the
    /// response arrives.
    pub fn register(&self, id: &str) -> oneshot::Receiver<ToolOutcome> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id.to_string(), tx);
        rx
    }

    /// Deliver a response. Returns false when no waiter exists (late or
    /// spurious responses are dropped).
    pub fn complete(&self, id: &str, outcome: ToolOutcome) -> bool {
        match self.waiters.remove(id) {
            Some((_, tx)) => tx.send(outcome).is_ok(),
            None => {
                debug!(request_id = id, "dropping response with no pending entry");
                false
            }
        }
    }

    /// Remove a waiter without delivering (timeout / cancellation path).
    pub fn forget(&self, id: &str) {
        self.waiters.remove(id);
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
