//! Agent provider abstractions for trellis.
//!
//! The engine is provider-agnostic: it talks to agents through the
//! [`AgentProvider`] trait and resolves a provider per model via the
//! [`AgentRegistry`]. Concrete LLM adapters live outside the core; this
//! crate ships only the [`StubProvider`] used by tests and local runs.

pub mod error;
pub mod registry;
pub mod stub;
pub mod traits;

pub use error::{LlmError, Result};
pub use registry::AgentRegistry;
pub use stub::{StubProvider, StubResponses};
pub use traits::{AgentProvider, AgentRequest, AgentResponse};
