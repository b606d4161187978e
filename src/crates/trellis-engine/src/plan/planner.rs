//! The LLM planner: prompts a planning agent and parses its step list.

use serde_json::Value;
use tracing::debug;
use trellis_core::{Plan, PlanMode, PlannedStep, StandardNode, Workflow};
use trellis_llm::AgentRegistry;

use crate::registry::ToolRegistry;

/// Builds and revises dynamic plans by prompting a planning agent.
#[derive(Debug, Default, Clone)]
pub struct LlmPlanner;

impl LlmPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Ask the planning agent for a plan toward `goal`.
    ///
    /// The planner agent is the node's `planner_agent_id` when set,
    /// otherwise the node's own agent. Errors are strings: the caller
    /// turns them into a node-level FAILURE.
    pub async fn create_plan(
        &self,
        node: &StandardNode,
        goal: &str,
        tools: &ToolRegistry,
        workflow: &Workflow,
        agents: &AgentRegistry,
    ) -> Result<Plan, String> {
        let planning = node
            .planning
            .as_ref()
            .ok_or_else(|| "planning not enabled".to_string())?;
        let planner_id = planning.planner_agent_id.as_deref().unwrap_or(&node.agent_id);
        let planner = workflow.agent(planner_id).map_err(|e| e.to_string())?;

        let prompt = format!(
            "You are a planning agent. Produce a step-by-step plan for this goal:\n{goal}\n\n\
             Available tools:\n{}\n\n\
             Constraints:\n{}\n\n\
             Respond with a JSON array. Each element is either\n\
             {{\"tool\": \"<name>\", \"arguments\": {{...}}, \"description\": \"...\"}}\n\
             for a tool call, or\n\
             {{\"synthesize\": true, \"description\": \"...\"}}\n\
             for a synthesis step over prior results.",
            tools.describe(),
            planning.constraints.join("\n"),
        );

        let response = agents
            .invoke(planner, &prompt)
            .await
            .map_err(|e| format!("planner invocation failed: {e}"))?;

        let steps = parse_steps(&response.content)
            .ok_or_else(|| format!("planner returned unparseable plan: {}", truncate(&response.content)))?;
        debug!(node = %node.id, steps = steps.len(), "plan created");

        let mut plan = Plan::new(&node.id, PlanMode::Dynamic, steps);
        plan.constraints = planning.constraints.clone();
        Ok(plan)
    }

    /// Ask the planner for a replacement plan after a step failure.
    pub async fn revise_plan(
        &self,
        plan: &Plan,
        failed_step: usize,
        failure: &str,
        node: &StandardNode,
        workflow: &Workflow,
        agents: &AgentRegistry,
    ) -> Result<Plan, String> {
        let planning = node
            .planning
            .as_ref()
            .ok_or_else(|| "planning not enabled".to_string())?;
        let planner_id = planning.planner_agent_id.as_deref().unwrap_or(&node.agent_id);
        let planner = workflow.agent(planner_id).map_err(|e| e.to_string())?;

        let previous = serde_json::to_string_pretty(&plan.steps).map_err(|e| e.to_string())?;
        let prompt = format!(
            "Your previous plan failed at step {failed_step}: {failure}\n\n\
             Previous plan:\n{previous}\n\n\
             Produce a revised plan as a JSON array in the same format.",
        );

        let response = agents
            .invoke(planner, &prompt)
            .await
            .map_err(|e| format!("plan revision failed: {e}"))?;

        let steps = parse_steps(&response.content)
            .ok_or_else(|| format!("revised plan unparseable: {}", truncate(&response.content)))?;
        let mut revised = Plan::new(&plan.node_id, PlanMode::Dynamic, steps);
        revised.constraints = plan.constraints.clone();
        Ok(revised)
    }
}

/// Parse a planner response into steps. Markdown code fences are
/// stripped; bare arrays are accepted.
pub fn parse_steps(text: &str) -> Option<Vec<PlannedStep>> {
    let body = strip_fences(text);
    let start = body.find('[')?;
    let end = body.rfind(']')?;
    if end <= start {
        return None;
    }
    let items: Vec<Value> = serde_json::from_str(&body[start..=end]).ok()?;

    let mut steps = Vec::with_capacity(items.len());
    for item in items {
        let obj = item.as_object()?;
        if let Some(tool) = obj.get("tool").and_then(Value::as_str) {
            steps.push(PlannedStep::ToolCall {
                name: tool.to_string(),
                arguments: obj.get("arguments").cloned().unwrap_or_else(|| Value::Object(Default::default())),
                description: obj
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        } else if obj.get("synthesize").and_then(Value::as_bool).unwrap_or(false) {
            steps.push(PlannedStep::Synthesize {
                agent_id: None,
                prompt: obj
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        } else {
            return None;
        }
    }
    Some(steps)
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim();
        }
        return rest.trim();
    }
    trimmed
}

fn truncate(text: &str) -> String {
    let mut out: String = text.chars().take(120).collect();
    if text.len() > out.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bare_array() {
        let steps = parse_steps(
            r#"[{"tool": "search", "arguments": {"q": "rust"}, "description": "look"},
                {"synthesize": true, "description": "summarize findings"}]"#,
        )
        .unwrap();

        assert_eq!(steps.len(), 2);
        match &steps[0] {
            PlannedStep::ToolCall { name, arguments, .. } => {
                assert_eq!(name, "search");
                assert_eq!(arguments["q"], json!("rust"));
            }
            other => panic!("unexpected step: {other:?}"),
        }
        match &steps[1] {
            PlannedStep::Synthesize { agent_id, prompt } => {
                assert!(agent_id.is_none());
                assert_eq!(prompt, "summarize findings");
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_parse_fenced_array() {
        let text = "Here is the plan:\n```json\n[{\"tool\": \"fetch\", \"arguments\": {}}]\n```";
        let steps = parse_steps(text).unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_parse_rejects_unknown_step_shape() {
        assert!(parse_steps(r#"[{"something": "else"}]"#).is_none());
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_steps("I think we should first search and then write").is_none());
    }
}
