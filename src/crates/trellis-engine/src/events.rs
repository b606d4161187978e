//! Live execution progress events.
//!
//! Events are best-effort: the engine never blocks on a slow consumer. A
//! full or closed channel drops the event.

use tokio::sync::mpsc;
use trellis_core::NodeStatus;

/// Progress notifications emitted while an execution runs.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    NodeStarted {
        execution_id: String,
        node_id: String,
    },
    NodeCompleted {
        execution_id: String,
        node_id: String,
        status: NodeStatus,
    },
    Checkpointed {
        execution_id: String,
        node_id: String,
    },
    Backtracked {
        execution_id: String,
        from: String,
        to: String,
    },
    ExecutionFinished {
        execution_id: String,
        outcome: String,
    },
}

/// Non-blocking fan-out handle for [`ExecutionEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::Sender<ExecutionEvent>>,
}

impl EventSink {
    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(sender: mpsc::Sender<ExecutionEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn emit(&self, event: ExecutionEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.try_send(event);
        }
    }
}
