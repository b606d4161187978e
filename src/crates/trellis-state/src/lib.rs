//! Tenant-scoped persistence contracts for trellis.
//!
//! Only the repository contracts matter to the engine; the in-memory
//! implementations here provide read-your-writes semantics per tenant and
//! are safe under concurrent callers. Production deployments swap in a
//! database-backed implementation of the same traits.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StateError, Result};
pub use memory::{InMemoryStateRepository, InMemoryWorkflowRepository};
pub use traits::{StateRepository, WorkflowRepository};
