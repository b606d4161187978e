//! Plan construction and step execution for planning-enabled nodes.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use trellis_core::{
    ExecutionState, NodeResult, Plan, PlanMode, PlannedStep, StandardNode, Workflow,
    KEY_PLAN_FAILURE_TARGET, KEY_PLAN_REVIEW_REQUIRED,
};

use crate::error::Result;
use crate::executor::WorkflowExecutor;
use crate::plan::observer::PlanEvent;
use crate::tenant::TenantContext;

impl WorkflowExecutor {
    /// Execute a standard node through the plan subsystem.
    ///
    /// An approved plan stored under `"{node_id}_plan"` (by a previous
    /// review pause, possibly edited by the reviewer) short-circuits
    /// construction and the review gate.
    pub(crate) async fn execute_plan_node(
        &self,
        workflow: &Arc<Workflow>,
        node: &StandardNode,
        tenant: &TenantContext,
        state: &mut ExecutionState,
    ) -> Result<NodeResult> {
        let planning = match &node.planning {
            Some(planning) => planning,
            None => {
                return Ok(NodeResult::failure(format!(
                    "node '{}' has no planning config",
                    node.id
                )))
            }
        };
        let plan_key = format!("{}_plan", node.id);
        let goal = self.resolver.resolve(&node.prompt, &state.context);

        let (mut plan, resumed) = match state.get(&plan_key) {
            Some(stored) => match serde_json::from_value::<Plan>(stored.clone()) {
                Ok(plan) => (plan, true),
                Err(e) => {
                    return Ok(self.plan_failure(
                        state,
                        format!("stored plan for '{}' is invalid: {e}", node.id),
                    ))
                }
            },
            None => {
                let plan = match planning.mode {
                    PlanMode::Static => {
                        let mut plan =
                            Plan::new(&node.id, PlanMode::Static, planning.steps.clone());
                        plan.constraints = planning.constraints.clone();
                        plan
                    }
                    PlanMode::Dynamic => {
                        match self
                            .planner
                            .create_plan(node, &goal, &self.tools, workflow, &self.agents)
                            .await
                        {
                            Ok(plan) => plan,
                            Err(e) => return Ok(self.plan_failure(state, e)),
                        }
                    }
                };
                (plan, false)
            }
        };

        enrich_synthesize_agents(&mut plan, &node.agent_id);

        if !resumed {
            self.notify_plan(&PlanEvent::PlanCreated {
                node_id: node.id.clone(),
                mode: format!("{:?}", plan.mode),
                steps: plan.steps.len(),
            });

            if planning.require_review {
                state.set(plan_key.clone(), serde_json::to_value(&plan)?);
                let mut metadata = Map::new();
                metadata.insert(KEY_PLAN_REVIEW_REQUIRED.to_string(), json!(true));
                metadata.insert("plan".to_string(), serde_json::to_value(&plan)?);
                debug!(node = %node.id, "plan awaiting human review");
                return Ok(NodeResult::pending_with_metadata(metadata));
            }
        }

        let outcome = self.run_plan(workflow, node, tenant, state, plan).await?;
        if outcome.is_success() {
            state.context.remove(&plan_key);
        }
        Ok(outcome)
    }

    async fn run_plan(
        &self,
        workflow: &Arc<Workflow>,
        node: &StandardNode,
        tenant: &TenantContext,
        state: &mut ExecutionState,
        mut plan: Plan,
    ) -> Result<NodeResult> {
        let revision_cap = self.config.plan_revision_cap;
        let mut revisions = 0u32;
        let mut index = 0usize;
        let mut last_output = String::new();
        let mut step_outputs: Vec<(String, String)> = Vec::new();

        while index < plan.steps.len() {
            let step = plan.steps[index].clone();
            self.notify_plan(&PlanEvent::PlanStepStarted {
                node_id: node.id.clone(),
                index,
                step: step.describe(),
            });

            let outcome = match &step {
                PlannedStep::ToolCall { name, arguments, .. } => {
                    self.run_tool_step(tenant, name, arguments, state).await
                }
                PlannedStep::Synthesize { agent_id, prompt } => {
                    self.run_synthesize_step(workflow, node, agent_id.as_deref(), prompt, &step_outputs, state)
                        .await
                }
            };

            match outcome {
                Ok(output) => {
                    let stored: Value = serde_json::from_str(&output)
                        .unwrap_or_else(|_| Value::String(output.clone()));
                    state.set(format!("{}_step_{index}", node.id), stored);
                    step_outputs.push((step.describe(), output.clone()));
                    last_output = output;
                    self.notify_plan(&PlanEvent::PlanStepCompleted {
                        node_id: node.id.clone(),
                        index,
                    });
                    index += 1;
                }
                Err(error) => {
                    warn!(node = %node.id, index, error = %error, "plan step failed");
                    self.notify_plan(&PlanEvent::PlanStepFailed {
                        node_id: node.id.clone(),
                        index,
                        error: error.clone(),
                    });

                    if plan.mode == PlanMode::Dynamic && revisions < revision_cap {
                        match self
                            .planner
                            .revise_plan(&plan, index, &error, node, workflow, &self.agents)
                            .await
                        {
                            Ok(mut revised) => {
                                enrich_synthesize_agents(&mut revised, &node.agent_id);
                                revisions += 1;
                                index = 0;
                                step_outputs.clear();
                                self.notify_plan(&PlanEvent::PlanRevised {
                                    node_id: node.id.clone(),
                                    revision: revisions,
                                    steps: revised.steps.len(),
                                });
                                plan = revised;
                                continue;
                            }
                            Err(e) => {
                                return Ok(self
                                    .plan_failure(state, format!("plan revision failed: {e}")))
                            }
                        }
                    }
                    return Ok(
                        self.plan_failure(state, format!("plan step {index} failed: {error}"))
                    );
                }
            }
        }

        self.notify_plan(&PlanEvent::PlanCompleted {
            node_id: node.id.clone(),
        });

        let output = if last_output.is_empty() {
            serde_json::to_string(&json!(step_outputs
                .iter()
                .map(|(step, out)| json!({"step": step, "output": out}))
                .collect::<Vec<_>>()))
            .unwrap_or_default()
        } else {
            last_output
        };

        let mut metadata = Map::new();
        metadata.insert("plan_mode".to_string(), json!(format!("{:?}", plan.mode)));
        metadata.insert("plan_steps".to_string(), json!(plan.steps.len()));
        metadata.insert("plan_revisions".to_string(), json!(revisions));
        Ok(NodeResult::success_with_metadata(output, metadata))
    }

    async fn run_tool_step(
        &self,
        tenant: &TenantContext,
        name: &str,
        arguments: &Value,
        state: &ExecutionState,
    ) -> std::result::Result<String, String> {
        let Some(transport) = &self.transport else {
            return Err("no MCP endpoint".to_string());
        };
        let resolved = self.resolver.resolve_value(arguments, &state.context);
        match transport
            .call(tenant.id(), name, resolved, Some(self.config.default_tool_timeout))
            .await
        {
            Ok(value) => serde_json::to_string(&value).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn run_synthesize_step(
        &self,
        workflow: &Arc<Workflow>,
        node: &StandardNode,
        agent_id: Option<&str>,
        prompt: &str,
        prior: &[(String, String)],
        state: &ExecutionState,
    ) -> std::result::Result<String, String> {
        let agent_id = agent_id.unwrap_or(&node.agent_id);
        let agent = workflow.agent(agent_id).map_err(|e| e.to_string())?;

        let mut full_prompt = self.resolver.resolve(prompt, &state.context);
        if !prior.is_empty() {
            full_prompt.push_str("\n\nPrior step results:\n");
            for (step, output) in prior {
                full_prompt.push_str(&format!("[{step}]\n{output}\n"));
            }
        }

        self.agents
            .invoke(agent, &full_prompt)
            .await
            .map(|r| r.content)
            .map_err(|e| e.to_string())
    }

    /// Node-level plan failure, honoring a `_plan_failure_target` set in
    /// context.
    fn plan_failure(&self, state: &ExecutionState, diagnostic: String) -> NodeResult {
        let mut metadata = Map::new();
        if let Some(target) = state.get(KEY_PLAN_FAILURE_TARGET) {
            metadata.insert(KEY_PLAN_FAILURE_TARGET.to_string(), target.clone());
        }
        NodeResult::failure_with_metadata(diagnostic, metadata)
    }

    pub(crate) fn notify_plan(&self, event: &PlanEvent) {
        for observer in self.plan_observers.iter() {
            observer.on_event(event);
        }
    }
}

fn enrich_synthesize_agents(plan: &mut Plan, default_agent: &str) {
    for step in &mut plan.steps {
        if let PlannedStep::Synthesize { agent_id, .. } = step {
            if agent_id.is_none() {
                *agent_id = Some(default_agent.to_string());
            }
        }
    }
}
