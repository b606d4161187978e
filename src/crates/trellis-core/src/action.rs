//! Actions executed by action nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of an action node, executed in declaration order.
///
/// `Send` dispatches a payload to a named handler — in-process when a
/// handler registry entry exists, otherwise over the tool transport.
/// `Execute` references a local command registry and is only valid for
/// client-side executors; the server executor rejects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Send { handler: String, payload: Value },
    Execute { command: String },
}

impl Action {
    /// Short human-readable label for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Action::Send { handler, .. } => format!("send:{handler}"),
            Action::Execute { command } => format!("execute:{command}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_wire_encoding() {
        let action = Action::Send {
            handler: "read_file".to_string(),
            payload: json!({"path": "/tmp/x"}),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "send");
        assert_eq!(json["handler"], "read_file");

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            Action::Execute { command: "ls".to_string() }.describe(),
            "execute:ls"
        );
    }
}
