//! Post-execution stages of the node pipeline.
//!
//! Fixed order, driven by the interpreter: output extraction, history
//! recording, human review, rubric evaluation, transition resolution.
//! Any stage can stop the pipeline with a terminal outcome.

pub mod output;
pub mod transition;

pub(crate) use transition::TransitionDecision;
