//! Workflow definitions and construction-time validation.

use crate::error::{CoreError, Result};
use crate::node::{ForkTarget, Node};
use crate::rubric::Rubric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named agent configuration referenced by nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_role: Option<String>,
    /// Carry conversation context across invocations of this agent.
    #[serde(default)]
    pub maintain_context: bool,
}

fn default_temperature() -> f64 {
    0.7
}

/// An immutable workflow definition: a directed graph of [`Node`]s plus the
/// agents and rubrics they reference.
///
/// Construction validates the whole structure; a `Workflow` value is
/// internally consistent and read-only at runtime, shared freely across
/// concurrent executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub version: String,
    pub start_node: String,
    pub nodes: HashMap<String, Node>,
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
    /// Rubric id -> definition source (JSON).
    #[serde(default)]
    pub rubrics: HashMap<String, String>,
}

impl Workflow {
    /// Build and validate a workflow.
    ///
    /// # Errors
    ///
    /// Returns a definition error when the start node is missing, any
    /// transition (or fork/join/loop/consensus) target references an
    /// unknown node, a node references an undeclared agent or rubric, or a
    /// rubric source fails to parse.
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        start_node: impl Into<String>,
        nodes: Vec<Node>,
        agents: Vec<AgentConfig>,
        rubrics: HashMap<String, String>,
    ) -> Result<Self> {
        let mut node_map = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let node_id = node.id().to_string();
            if node_map.insert(node_id.clone(), node).is_some() {
                return Err(CoreError::Validation(format!("duplicate node id: {node_id}")));
            }
        }

        let workflow = Self {
            id: id.into(),
            version: version.into(),
            start_node: start_node.into(),
            nodes: node_map,
            agents: agents.into_iter().map(|a| (a.id.clone(), a)).collect(),
            rubrics,
        };
        workflow.validate()?;
        Ok(workflow)
    }

    /// Re-run structural validation, e.g. after deserializing a pushed
    /// definition.
    pub fn validate(&self) -> Result<()> {
        if !self.nodes.contains_key(&self.start_node) {
            return Err(CoreError::Validation(format!(
                "start node '{}' does not exist",
                self.start_node
            )));
        }

        for node in self.nodes.values() {
            for rule in node.transitions() {
                for target in rule.targets() {
                    self.require_node(node.id(), target)?;
                }
            }

            match node {
                Node::Standard(n) => {
                    self.require_agent(&n.agent_id)?;
                    if let Some(rubric_id) = &n.rubric_id {
                        self.require_rubric(rubric_id)?;
                    }
                    if let Some(planning) = &n.planning {
                        if let Some(planner) = &planning.planner_agent_id {
                            self.require_agent(planner)?;
                        }
                    }
                }
                Node::Parallel(n) => {
                    self.require_node(node.id(), &n.on_consensus)?;
                    self.require_node(node.id(), &n.on_no_consensus)?;
                    if n.branches.is_empty() {
                        return Err(CoreError::Validation(format!(
                            "parallel node '{}' has no branches",
                            n.id
                        )));
                    }
                    for branch in &n.branches {
                        self.require_agent(&branch.agent_id)?;
                        if let Some(rubric_id) = &branch.rubric_id {
                            self.require_rubric(rubric_id)?;
                        }
                    }
                    if let Some(judge) = &n.judge_agent_id {
                        self.require_agent(judge)?;
                    }
                }
                Node::Fork(n) => {
                    for target in &n.targets {
                        if let ForkTarget::Node { id } = target {
                            self.require_node(node.id(), id)?;
                        }
                    }
                }
                Node::Join(n) => {
                    for target in &n.await_targets {
                        match self.nodes.get(target) {
                            Some(Node::Fork(_)) => {}
                            Some(_) => {
                                return Err(CoreError::Validation(format!(
                                    "join '{}' awaits '{target}', which is not a fork node",
                                    n.id
                                )))
                            }
                            None => return Err(CoreError::UnknownNode(target.clone())),
                        }
                    }
                }
                Node::Loop(n) => {
                    self.require_node(node.id(), &n.body_start)?;
                    for rule in &n.break_rules {
                        self.require_node(node.id(), &rule.next)?;
                    }
                }
                Node::SubWorkflow(_) | Node::Action(_) | Node::Generic(_) | Node::End(_) => {}
            }
        }

        // Rubric sources must parse so evaluation can't fail on a bad
        // definition mid-execution.
        for (rubric_id, source) in &self.rubrics {
            Rubric::parse(rubric_id, source)?;
        }

        Ok(())
    }

    pub fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| CoreError::UnknownNode(id.to_string()))
    }

    pub fn agent(&self, id: &str) -> Result<&AgentConfig> {
        self.agents
            .get(id)
            .ok_or_else(|| CoreError::UnknownAgent(id.to_string()))
    }

    /// Parsed rubric for `id`.
    pub fn rubric(&self, id: &str) -> Result<Rubric> {
        let source = self
            .rubrics
            .get(id)
            .ok_or_else(|| CoreError::UnknownRubric(id.to_string()))?;
        Rubric::parse(id, source)
    }

    fn require_node(&self, referrer: &str, target: &str) -> Result<()> {
        if self.nodes.contains_key(target) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "node '{referrer}' references unknown node '{target}'"
            )))
        }
    }

    fn require_agent(&self, id: &str) -> Result<()> {
        if self.agents.contains_key(id) {
            Ok(())
        } else {
            Err(CoreError::UnknownAgent(id.to_string()))
        }
    }

    fn require_rubric(&self, id: &str) -> Result<()> {
        if self.rubrics.contains_key(id) {
            Ok(())
        } else {
            Err(CoreError::UnknownRubric(id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{EndNode, ExitStatus, StandardNode};
    use crate::transition::TransitionRule;

    fn agent(id: &str) -> AgentConfig {
        AgentConfig {
            id: id.to_string(),
            model: "stub".to_string(),
            temperature: 0.7,
            system_role: None,
            maintain_context: false,
        }
    }

    fn standard(id: &str, agent_id: &str, target: &str) -> Node {
        Node::Standard(StandardNode {
            id: id.to_string(),
            agent_id: agent_id.to_string(),
            prompt: "go".to_string(),
            output_params: vec![],
            planning: None,
            review: None,
            rubric_id: None,
            snapshot_state: false,
            transitions: vec![TransitionRule::Success {
                target: target.to_string(),
            }],
        })
    }

    fn end(id: &str) -> Node {
        Node::End(EndNode {
            id: id.to_string(),
            status: ExitStatus::Success,
        })
    }

    #[test]
    fn test_valid_linear_workflow() {
        let wf = Workflow::new(
            "wf",
            "1",
            "process",
            vec![standard("process", "a", "done"), end("done")],
            vec![agent("a")],
            HashMap::new(),
        );
        assert!(wf.is_ok());
    }

    #[test]
    fn test_missing_start_node_rejected() {
        let err = Workflow::new(
            "wf",
            "1",
            "nope",
            vec![end("done")],
            vec![],
            HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_dangling_transition_target_rejected() {
        let err = Workflow::new(
            "wf",
            "1",
            "process",
            vec![standard("process", "a", "missing")],
            vec![agent("a")],
            HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_missing_agent_rejected() {
        let err = Workflow::new(
            "wf",
            "1",
            "process",
            vec![standard("process", "ghost", "done"), end("done")],
            vec![],
            HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::UnknownAgent(_)));
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let err = Workflow::new(
            "wf",
            "1",
            "done",
            vec![end("done"), end("done")],
            vec![],
            HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_bad_rubric_source_rejected() {
        let mut rubrics = HashMap::new();
        rubrics.insert("q".to_string(), "not json".to_string());
        let err = Workflow::new("wf", "1", "done", vec![end("done")], vec![], rubrics).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRubric { .. }));
    }

    #[test]
    fn test_workflow_serde_round_trip() {
        let wf = Workflow::new(
            "wf",
            "2",
            "process",
            vec![standard("process", "a", "done"), end("done")],
            vec![agent("a")],
            HashMap::new(),
        )
        .unwrap();

        let encoded = serde_json::to_string(&wf).unwrap();
        let back: Workflow = serde_json::from_str(&encoded).unwrap();
        assert_eq!(back, wf);
        assert!(back.validate().is_ok());
    }
}
