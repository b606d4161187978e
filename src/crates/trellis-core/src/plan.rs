//! Per-node plans: ordered tool-call and synthesize steps.
//!
//! A plan is either carried statically in the node definition or produced
//! at runtime by the planner agent. Dynamic plans may be revised in place
//! after a step failure; static plans are never revised.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a node's plan is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanMode {
    Static,
    Dynamic,
}

/// One step of a [`Plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannedStep {
    /// Invoke a named tool over the transport with JSON arguments.
    ToolCall {
        name: String,
        #[serde(default)]
        arguments: Value,
        #[serde(default)]
        description: String,
    },
    /// Invoke an agent to synthesize over prior step outputs.
    ///
    /// The planner emits synthesize steps without an agent; the plan
    /// executor fills in the owning node's agent id before running.
    Synthesize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
        prompt: String,
    },
}

impl PlannedStep {
    pub fn describe(&self) -> String {
        match self {
            PlannedStep::ToolCall { name, .. } => format!("tool:{name}"),
            PlannedStep::Synthesize { agent_id, .. } => {
                format!("synthesize:{}", agent_id.as_deref().unwrap_or("?"))
            }
        }
    }
}

/// An ordered list of steps executed inside a single standard node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub node_id: String,
    pub mode: PlanMode,
    pub steps: Vec<PlannedStep>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl Plan {
    pub fn new(node_id: impl Into<String>, mode: PlanMode, steps: Vec<PlannedStep>) -> Self {
        Self {
            node_id: node_id.into(),
            mode,
            steps,
            constraints: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_step_wire_encoding() {
        let step = PlannedStep::ToolCall {
            name: "search".to_string(),
            arguments: json!({"query": "rust"}),
            description: "look it up".to_string(),
        };
        let encoded = serde_json::to_value(&step).unwrap();
        assert_eq!(encoded["type"], "tool_call");
        assert_eq!(encoded["name"], "search");

        let back: PlannedStep = serde_json::from_value(encoded).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_synthesize_without_agent() {
        let step: PlannedStep =
            serde_json::from_value(json!({"type": "synthesize", "prompt": "summarize"})).unwrap();
        match step {
            PlannedStep::Synthesize { agent_id, prompt } => {
                assert!(agent_id.is_none());
                assert_eq!(prompt, "summarize");
            }
            _ => panic!("expected synthesize step"),
        }
    }

    #[test]
    fn test_plan_round_trip() {
        let plan = Plan::new(
            "research",
            PlanMode::Dynamic,
            vec![
                PlannedStep::ToolCall {
                    name: "fetch".to_string(),
                    arguments: json!({}),
                    description: String::new(),
                },
                PlannedStep::Synthesize {
                    agent_id: Some("writer".to_string()),
                    prompt: "combine".to_string(),
                },
            ],
        );

        let encoded = serde_json::to_value(&plan).unwrap();
        let back: Plan = serde_json::from_value(encoded).unwrap();
        assert_eq!(back, plan);
        assert_eq!(back.len(), 2);
    }
}
