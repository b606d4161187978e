//! Join node execution: await fork futures, merge results.

use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use trellis_core::{ExecutionState, JoinNode, MergeStrategy, NodeResult};

use crate::error::Result;
use crate::executor::{CancelSignal, WorkflowExecutor};
use crate::nodes::{ForkOutcome, ForkTable};

impl WorkflowExecutor {
    /// Await the futures of the named fork nodes under an optional
    /// deadline and merge per-target results into the output field.
    pub(crate) async fn execute_join(
        &self,
        node: &JoinNode,
        state: &mut ExecutionState,
        forks: &mut ForkTable,
        cancel: &CancelSignal,
    ) -> Result<NodeResult> {
        let deadline = (node.timeout_ms > 0)
            .then(|| Instant::now() + Duration::from_millis(node.timeout_ms));

        let mut merged = Map::new();
        let mut errors = 0usize;

        for fork_id in &node.await_targets {
            let futures_key = format!("{fork_id}_futures");
            let Some(targets) = forks.take(&futures_key) else {
                errors += 1;
                merged.insert(
                    fork_id.clone(),
                    json!({"error": format!("no futures recorded under {futures_key}")}),
                );
                continue;
            };

            for (label, outcome) in targets {
                if cancel.is_cancelled() {
                    return Err(crate::error::EngineError::Cancelled);
                }
                let value = match outcome {
                    ForkOutcome::Ready(value) => value,
                    ForkOutcome::Pending(handle) => match deadline {
                        Some(deadline) => {
                            let abort = handle.abort_handle();
                            match tokio::time::timeout_at(deadline, handle).await {
                                Ok(joined) => joined.unwrap_or_else(|e| Err(e.to_string())),
                                Err(_) => {
                                    abort.abort();
                                    Err("timeout".to_string())
                                }
                            }
                        }
                        None => handle.await.unwrap_or_else(|e| Err(e.to_string())),
                    },
                };

                match value {
                    Ok(value) => {
                        merged.insert(label, value);
                    }
                    Err(error) => {
                        errors += 1;
                        merged.insert(label, json!({"error": error}));
                    }
                }
            }
        }

        match node.merge {
            MergeStrategy::CollectAll => {
                state.set(node.output_field.clone(), Value::Object(merged.clone()));
            }
        }
        debug!(node = %node.id, targets = merged.len(), errors, "join merged");

        let mut metadata = Map::new();
        metadata.insert("merged_count".to_string(), json!(merged.len()));
        metadata.insert("error_count".to_string(), json!(errors));

        if errors > 0 && node.fail_on_any_error {
            Ok(NodeResult::failure_with_metadata(
                format!("join '{}' saw {errors} failed target(s)", node.id),
                metadata,
            ))
        } else {
            Ok(NodeResult::success_with_metadata(
                serde_json::to_string(&Value::Object(merged)).unwrap_or_default(),
                metadata,
            ))
        }
    }
}
