//! Core data model for the trellis workflow engine.
//!
//! This crate defines the two halves of the engine's data model:
//!
//! - **Definitions** — immutable after construction. A [`Workflow`] owns a
//!   graph of tagged [`Node`] variants, the [`AgentConfig`]s they reference,
//!   and rubric definitions. [`Workflow::new`] validates the whole structure
//!   once; nothing downstream re-checks it.
//! - **Execution state** — mutable only through explicit transitions. An
//!   [`ExecutionState`] owns the per-execution context map, append-only
//!   [`ExecutionHistory`], and per-node retry counters, and snapshots into an
//!   [`ExecutionSnapshot`] at checkpoint boundaries.
//!
//! ```text
//!   Workflow (shared, read-only)          ExecutionState (single writer)
//!   ┌──────────────────────────┐          ┌───────────────────────────┐
//!   │ nodes: id -> Node        │  drives  │ current_node              │
//!   │ agents: id -> AgentConfig│ ───────► │ context: {k: json}        │
//!   │ rubrics: id -> source    │          │ history: steps+backtracks │
//!   │ start_node               │          │ retry / backtrack counts  │
//!   └──────────────────────────┘          └─────────────┬─────────────┘
//!                                                       │ to_snapshot()
//!                                                       ▼
//!                                            ExecutionSnapshot (wire/store)
//! ```
//!
//! All tagged enums ([`Node`], [`TransitionRule`], [`Action`],
//! [`PlannedStep`]) use a `type` discriminator that doubles as the on-wire
//! JSON encoding.

pub mod action;
pub mod error;
pub mod history;
pub mod node;
pub mod plan;
pub mod result;
pub mod rubric;
pub mod snapshot;
pub mod state;
pub mod template;
pub mod transition;
pub mod workflow;

pub use action::Action;
pub use error::{CoreError, Result};
pub use history::{BacktrackEvent, BacktrackKind, ExecutionHistory, ExecutionStep};
pub use node::{
    ActionNode, Branch, BreakRule, Condition, ConsensusStrategy, EndNode, ExitStatus, ForkNode,
    ForkTarget, GenericNode, JoinNode, LoopNode, MergeStrategy, Node, ParallelNode, PlanningConfig,
    ReviewConfig, ReviewTrigger, StandardNode, SubWorkflowNode,
};
pub use plan::{Plan, PlanMode, PlannedStep};
pub use result::{NodeResult, NodeStatus};
pub use rubric::{Rubric, RubricCriterion, RubricEvaluation};
pub use snapshot::{CheckpointReason, ExecutionSnapshot};
pub use state::{ExecutionState, KEY_EXECUTION_ID, KEY_PLAN_FAILURE_TARGET, KEY_PLAN_REVIEW_REQUIRED, KEY_TENANT_ID};
pub use template::TemplateResolver;
pub use transition::{ScoreCondition, ScoreOp, TransitionRule};
pub use workflow::{AgentConfig, Workflow};
