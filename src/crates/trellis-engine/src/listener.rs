//! Checkpoint and completion callbacks.

use async_trait::async_trait;
use trellis_core::ExecutionSnapshot;

/// Durability hooks invoked by the interpreter.
///
/// `on_checkpoint` fires before every non-end node executes; the service
/// layer persists the snapshot (reason `checkpoint`), making it the
/// inter-node durability boundary. `on_final` fires exactly once per
/// engine return with the paused or terminal snapshot.
#[async_trait]
pub trait ExecutionListener: Send + Sync {
    async fn on_checkpoint(&self, snapshot: ExecutionSnapshot);

    async fn on_final(&self, snapshot: ExecutionSnapshot);
}

/// Listener that persists nothing. Used for sub-workflow children and
/// tests that only assert on the returned state.
#[derive(Debug, Default, Clone)]
pub struct NoopListener;

#[async_trait]
impl ExecutionListener for NoopListener {
    async fn on_checkpoint(&self, _snapshot: ExecutionSnapshot) {}

    async fn on_final(&self, _snapshot: ExecutionSnapshot) {}
}
