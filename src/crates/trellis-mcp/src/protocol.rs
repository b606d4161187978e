//! JSON-RPC 2.0 frames for the tool wire protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Outbound frame (server -> client). One JSON object per stream event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFrame {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: ToolCallParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Value,
}

impl ToolCallFrame {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: METHOD_TOOLS_CALL.to_string(),
            params: ToolCallParams {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Inbound frame (client -> server) on the response endpoint.
///
/// Frames without an `id` are notifications and must be ignored by
/// request correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponseFrame {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_frame_shape() {
        let frame = ToolCallFrame::new("req-1", "read_file", json!({"path": "/tmp/a"}));
        let encoded = serde_json::to_value(&frame).unwrap();

        assert_eq!(encoded["jsonrpc"], "2.0");
        assert_eq!(encoded["id"], "req-1");
        assert_eq!(encoded["method"], "tools/call");
        assert_eq!(encoded["params"]["name"], "read_file");
        assert_eq!(encoded["params"]["arguments"]["path"], "/tmp/a");
    }

    #[test]
    fn test_inbound_result_frame() {
        let frame: ToolResponseFrame = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": "req-1",
            "result": {"content": [{"type": "text", "text": "data"}]}
        }))
        .unwrap();

        assert_eq!(frame.id.as_deref(), Some("req-1"));
        assert!(frame.result.is_some());
        assert!(frame.error.is_none());
    }

    #[test]
    fn test_notification_has_no_id() {
        let frame: ToolResponseFrame = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "result": {"event": "progress"}
        }))
        .unwrap();
        assert!(frame.id.is_none());
    }
}
