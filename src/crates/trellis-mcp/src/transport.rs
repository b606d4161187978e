//! The blocking call path: emit a frame, await the correlated response.

use crate::channels::TenantChannels;
use crate::error::{Result, TransportError};
use crate::pending::PendingRequests;
use crate::protocol::{ToolCallFrame, ToolResponseFrame};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Server-side tool transport.
///
/// `call` suspends the calling task (not the scheduler) until the tenant's
/// client answers on the response endpoint or the per-tool timeout fires.
/// A timed-out or failed call always clears its pending entry.
#[derive(Debug)]
pub struct ToolTransport {
    channels: Arc<TenantChannels>,
    pending: Arc<PendingRequests>,
    default_timeout: Duration,
}

impl ToolTransport {
    pub fn new(channels: Arc<TenantChannels>, pending: Arc<PendingRequests>) -> Self {
        Self {
            channels,
            pending,
            default_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn channels(&self) -> &Arc<TenantChannels> {
        &self.channels
    }

    pub fn pending(&self) -> &Arc<PendingRequests> {
        &self.pending
    }

    /// Issue `tools/call` for `tenant_id` and await the result.
    pub async fn call(
        &self,
        tenant_id: &str,
        tool: &str,
        arguments: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        if !self.channels.is_connected(tenant_id) {
            return Err(TransportError::NoEndpoint);
        }

        let request_id = Uuid::new_v4().to_string();
        let rx = self.pending.register(&request_id);
        let frame = ToolCallFrame::new(&request_id, tool, arguments);

        if let Err(e) = self.channels.send(tenant_id, frame).await {
            self.pending.forget(&request_id);
            return Err(e);
        }

        let timeout = timeout.unwrap_or(self.default_timeout);
        debug!(tenant = tenant_id, tool, request = %request_id, ?timeout, "tool call issued");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(rpc))) => Err(TransportError::Rpc {
                code: rpc.code,
                message: rpc.message,
            }),
            // Waiter dropped without delivery: treat as a closed channel.
            Ok(Err(_)) => {
                self.pending.forget(&request_id);
                Err(TransportError::ChannelClosed(tenant_id.to_string()))
            }
            Err(_) => {
                self.pending.forget(&request_id);
                warn!(tenant = tenant_id, tool, request = %request_id, "tool call timed out");
                Err(TransportError::Timeout {
                    tool: tool.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Route an inbound frame from the response endpoint. Frames without
    /// an id (notifications) and unknown ids are dropped.
    pub fn handle_response(&self, frame: ToolResponseFrame) {
        let Some(id) = frame.id else {
            debug!("ignoring notification frame");
            return;
        };
        let outcome = match (frame.result, frame.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        };
        self.pending.complete(&id, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RpcError;
    use serde_json::json;

    fn transport() -> ToolTransport {
        ToolTransport::new(
            Arc::new(TenantChannels::new()),
            Arc::new(PendingRequests::new()),
        )
    }

    #[tokio::test]
    async fn test_call_without_endpoint_fails_without_leak() {
        let transport = transport();
        let err = transport.call("t1", "read", json!({}), None).await.unwrap_err();
        assert!(matches!(err, TransportError::NoEndpoint));
        assert!(transport.pending().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let transport = Arc::new(transport());
        let mut rx = transport.channels().connect("t1", 8);

        // Simulated client: answer the first frame it sees.
        let responder = transport.clone();
        let client = tokio::spawn(async move {
            let frame = rx.recv().await.unwrap();
            responder.handle_response(ToolResponseFrame {
                jsonrpc: "2.0".to_string(),
                id: Some(frame.id),
                result: Some(json!({"content": [{"type": "text", "text": "file data"}]})),
                error: None,
            });
        });

        let result = transport.call("t1", "read_file", json!({"path": "x"}), None).await.unwrap();
        assert_eq!(result["content"][0]["text"], "file data");
        assert!(transport.pending().is_empty());
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_rpc_error_surfaces() {
        let transport = Arc::new(transport());
        let mut rx = transport.channels().connect("t1", 8);

        let responder = transport.clone();
        tokio::spawn(async move {
            let frame = rx.recv().await.unwrap();
            responder.handle_response(ToolResponseFrame {
                jsonrpc: "2.0".to_string(),
                id: Some(frame.id),
                result: None,
                error: Some(RpcError {
                    code: -32000,
                    message: "denied".to_string(),
                }),
            });
        });

        let err = transport.call("t1", "rm", json!({}), None).await.unwrap_err();
        assert!(matches!(err, TransportError::Rpc { code: -32000, .. }));
        assert!(transport.pending().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_clears_pending_entry() {
        let transport = transport();
        let _rx = transport.channels().connect("t1", 8);

        let err = transport
            .call("t1", "slow", json!({}), Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
        assert!(transport.pending().is_empty());
    }

    #[tokio::test]
    async fn test_late_response_dropped() {
        let transport = transport();
        transport.handle_response(ToolResponseFrame {
            jsonrpc: "2.0".to_string(),
            id: Some("never-issued".to_string()),
            result: Some(json!(1)),
            error: None,
        });
        assert!(transport.pending().is_empty());
    }
}
