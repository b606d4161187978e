//! The closed set of workflow node kinds.
//!
//! Nodes are tagged variants: the `type` field discriminates both the
//! in-memory dispatch and the wire encoding. Every kind carries its id and
//! an ordered list of [`TransitionRule`]s (end nodes excepted — they are
//! terminal).

use crate::action::Action;
use crate::plan::{PlanMode, PlannedStep};
use crate::transition::TransitionRule;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Standard(StandardNode),
    Parallel(ParallelNode),
    Fork(ForkNode),
    Join(JoinNode),
    Loop(LoopNode),
    SubWorkflow(SubWorkflowNode),
    Action(ActionNode),
    Generic(GenericNode),
    End(EndNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Standard(n) => &n.id,
            Node::Parallel(n) => &n.id,
            Node::Fork(n) => &n.id,
            Node::Join(n) => &n.id,
            Node::Loop(n) => &n.id,
            Node::SubWorkflow(n) => &n.id,
            Node::Action(n) => &n.id,
            Node::Generic(n) => &n.id,
            Node::End(n) => &n.id,
        }
    }

    /// Ordered transition rules; empty for parallel nodes (routed by
    /// their consensus successors) and end nodes.
    pub fn transitions(&self) -> &[TransitionRule] {
        match self {
            Node::Standard(n) => &n.transitions,
            Node::Parallel(_) => &[],
            Node::Fork(n) => &n.transitions,
            Node::Join(n) => &n.transitions,
            Node::Loop(n) => &n.transitions,
            Node::SubWorkflow(n) => &n.transitions,
            Node::Action(n) => &n.transitions,
            Node::Generic(n) => &n.transitions,
            Node::End(_) => &[],
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Node::End(_))
    }

    /// Kind name as used by the wire encoding and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Standard(_) => "standard",
            Node::Parallel(_) => "parallel",
            Node::Fork(_) => "fork",
            Node::Join(_) => "join",
            Node::Loop(_) => "loop",
            Node::SubWorkflow(_) => "sub_workflow",
            Node::Action(_) => "action",
            Node::Generic(_) => "generic",
            Node::End(_) => "end",
        }
    }
}

/// A single-agent node: resolve the prompt, invoke the agent, map the
/// response. With [`PlanningConfig`] attached, execution is delegated to
/// the plan subsystem instead of a single call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardNode {
    pub id: String,
    pub agent_id: String,
    pub prompt: String,
    /// Top-level JSON keys to lift from the response into context.
    #[serde(default)]
    pub output_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning: Option<PlanningConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_id: Option<String>,
    /// Attach a state snapshot to this node's history step.
    #[serde(default)]
    pub snapshot_state: bool,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

/// Plan subsystem configuration for a standard node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningConfig {
    pub mode: PlanMode,
    /// Steps for STATIC mode; ignored for DYNAMIC.
    #[serde(default)]
    pub steps: Vec<PlannedStep>,
    /// Pause for human review once the plan is constructed.
    #[serde(default)]
    pub require_review: bool,
    /// Agent used by the planner; defaults to the node's agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planner_agent_id: Option<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// When the review post-processor consults the review handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewTrigger {
    Always,
    OnFailure,
    /// Only when the rubric score falls below `score_below`.
    OnLowScore,
}

/// Human-review configuration attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub trigger: ReviewTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_below: Option<f64>,
}

/// Consensus policy for a parallel node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusStrategy {
    MajorityVote,
    Unanimous,
    WeightedVote,
    JudgeDecides,
}

/// One concurrent arm of a parallel node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub agent_id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_id: Option<String>,
    #[serde(default = "default_branch_weight")]
    pub weight: f64,
}

fn default_branch_weight() -> f64 {
    1.0
}

/// Executes all branches concurrently, then combines their results under
/// the configured [`ConsensusStrategy`]. `on_consensus` / `on_no_consensus`
/// are the only successors; parallel nodes carry no general transition
/// rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelNode {
    pub id: String,
    pub branches: Vec<Branch>,
    pub strategy: ConsensusStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Judge agent for [`ConsensusStrategy::JudgeDecides`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_agent_id: Option<String>,
    pub on_consensus: String,
    pub on_no_consensus: String,
}

/// A fork target: a node in the same workflow, or a sub-workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForkTarget {
    Node { id: String },
    Workflow { workflow_id: String },
}

/// Spawns one concurrent task per target; futures are recorded under the
/// context key `"{id}_futures"` for a downstream join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkNode {
    pub id: String,
    pub targets: Vec<ForkTarget>,
    /// Wait for all targets before transitioning; otherwise fire-and-forget.
    #[serde(default)]
    pub wait_for_all: bool,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

/// How a join combines its awaited results. The enumeration grows as
/// merge policies are added; `CollectAll` is the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    CollectAll,
}

/// Awaits the futures of the named fork nodes and merges their results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinNode {
    pub id: String,
    /// Fork node ids whose futures to await.
    pub await_targets: Vec<String>,
    /// 0 means no timeout.
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default = "default_merge")]
    pub merge: MergeStrategy,
    pub output_field: String,
    /// Fail the join on any failed future, instead of recording a
    /// per-target error entry.
    #[serde(default)]
    pub fail_on_any_error: bool,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

fn default_merge() -> MergeStrategy {
    MergeStrategy::CollectAll
}

/// A context predicate used by loop conditions and break rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Always,
    /// True when the key exists and is truthy (non-false, non-null,
    /// non-empty, non-zero).
    Truthy { key: String },
    Equals { key: String, value: Value },
    LessThan { key: String, value: f64 },
    GreaterThan { key: String, value: f64 },
}

impl Condition {
    /// Evaluate against a context map.
    pub fn evaluate(&self, context: &Map<String, Value>) -> bool {
        match self {
            Condition::Always => true,
            Condition::Truthy { key } => match context.get(key) {
                None | Some(Value::Null) => false,
                Some(Value::Bool(b)) => *b,
                Some(Value::String(s)) => !s.is_empty() && s != "false",
                Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
                Some(Value::Array(a)) => !a.is_empty(),
                Some(Value::Object(o)) => !o.is_empty(),
            },
            Condition::Equals { key, value } => context.get(key) == Some(value),
            Condition::LessThan { key, value } => {
                numeric(context.get(key)).map(|n| n < *value).unwrap_or(false)
            }
            Condition::GreaterThan { key, value } => {
                numeric(context.get(key)).map(|n| n > *value).unwrap_or(false)
            }
        }
    }
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A targeted loop exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakRule {
    pub condition: Condition,
    pub next: String,
}

/// Re-enters `body_start` while `condition` holds, up to `max_iterations`.
/// Break rules are checked first and exit to their named node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopNode {
    pub id: String,
    pub body_start: String,
    #[serde(default = "default_condition")]
    pub condition: Condition,
    pub max_iterations: u32,
    #[serde(default)]
    pub break_rules: Vec<BreakRule>,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

fn default_condition() -> Condition {
    Condition::Always
}

/// Invokes another workflow of the same tenant, remapping context in and
/// out. Mapping entries are `child_key -> parent_key` for input and
/// `parent_key -> child_key` for output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubWorkflowNode {
    pub id: String,
    pub workflow_id: String,
    #[serde(default)]
    pub input_mapping: HashMap<String, String>,
    #[serde(default)]
    pub output_mapping: HashMap<String, String>,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

/// Runs an ordered action list; SUCCESS iff every action succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionNode {
    pub id: String,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

/// Delegates to a handler registered under `executor_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericNode {
    pub id: String,
    pub executor_type: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

/// Exit status declared by an end node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitStatus {
    Success,
    Failure,
    Cancelled,
}

/// Terminal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndNode {
    pub id: String,
    pub status: ExitStatus,
}
