//! The per-node plan subsystem: planner, plan executor, observers.
//!
//! When planning is enabled on a standard node, the node's single agent
//! call is replaced by: construct a plan (static from the definition, or
//! dynamic via the planner agent), optionally pause for human review,
//! then walk the steps — tool calls over the transport, synthesize steps
//! through the node's agent — revising the plan on step failure in
//! dynamic mode.

pub mod executor;
pub mod observer;
pub mod planner;

pub use observer::{PlanEvent, PlanObserver};
pub use planner::LlmPlanner;
