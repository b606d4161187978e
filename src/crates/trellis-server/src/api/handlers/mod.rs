pub mod executions;
pub mod mcp;
pub mod workflows;
