//! Per-tenant outbound channels.

use crate::error::{Result, TransportError};
use crate::protocol::ToolCallFrame;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Registry of connected tenant streams.
///
/// One outbound channel per tenant; a reconnect replaces the previous
/// channel (the old receiver closes and its stream ends).
#[derive(Debug, Default)]
pub struct TenantChannels {
    channels: DashMap<String, mpsc::Sender<ToolCallFrame>>,
}

impl TenantChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tenant's stream; returns the receiving side the
    /// streaming endpoint drains.
    pub fn connect(&self, tenant_id: &str, buffer: usize) -> mpsc::Receiver<ToolCallFrame> {
        let (tx, rx) = mpsc::channel(buffer);
        if self.channels.insert(tenant_id.to_string(), tx).is_some() {
            debug!(tenant = tenant_id, "replaced existing MCP channel");
        }
        rx
    }

    pub fn disconnect(&self, tenant_id: &str) {
        self.channels.remove(tenant_id);
    }

    pub fn is_connected(&self, tenant_id: &str) -> bool {
        self.channels.contains_key(tenant_id)
    }

    /// Emit a frame on the tenant's stream.
    pub async fn send(&self, tenant_id: &str, frame: ToolCallFrame) -> Result<()> {
        let sender = self
            .channels
            .get(tenant_id)
            .map(|entry| entry.value().clone())
            .ok_or(TransportError::NoEndpoint)?;

        sender.send(frame).await.map_err(|_| {
            warn!(tenant = tenant_id, "MCP channel closed, dropping registration");
            self.channels.remove(tenant_id);
            TransportError::ChannelClosed(tenant_id.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_without_channel_fails() {
        let channels = TenantChannels::new();
        let err = channels
            .send("t1", ToolCallFrame::new("1", "tool", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NoEndpoint));
    }

    #[tokio::test]
    async fn test_connect_and_send() {
        let channels = TenantChannels::new();
        let mut rx = channels.connect("t1", 8);

        channels
            .send("t1", ToolCallFrame::new("1", "tool", json!({"a": 1})))
            .await
            .unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.id, "1");
        assert_eq!(frame.params.name, "tool");
    }

    #[tokio::test]
    async fn test_closed_channel_is_unregistered() {
        let channels = TenantChannels::new();
        let rx = channels.connect("t1", 1);
        drop(rx);

        let err = channels
            .send("t1", ToolCallFrame::new("1", "tool", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ChannelClosed(_)));
        assert!(!channels.is_connected("t1"));
    }
}
