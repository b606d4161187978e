//! Plugin handler registries.
//!
//! Generic-node handlers, action handlers, and tool descriptors are
//! discovered by explicit registration at startup — no scanning. The
//! registries are process-wide and read-only once the engine is built.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use trellis_core::{GenericNode, NodeResult};

use crate::tenant::TenantContext;

/// The handle through which node executors and handlers mutate the
/// execution context. Executors never touch the workflow definition.
pub struct ExecutionContext<'a> {
    pub execution_id: &'a str,
    pub tenant: &'a TenantContext,
    context: &'a mut Map<String, Value>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        execution_id: &'a str,
        tenant: &'a TenantContext,
        context: &'a mut Map<String, Value>,
    ) -> Self {
        Self {
            execution_id,
            tenant,
            context,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.context.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.context.contains_key(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        self.context
    }
}

/// Executor for [`GenericNode`]s, keyed by `executor_type`. A `Pending`
/// result pauses the execution.
#[async_trait]
pub trait GenericNodeHandler: Send + Sync {
    async fn execute(&self, node: &GenericNode, ctx: &mut ExecutionContext<'_>) -> NodeResult;
}

/// Registry of generic-node handlers.
#[derive(Default)]
pub struct GenericHandlerRegistry {
    handlers: HashMap<String, Arc<dyn GenericNodeHandler>>,
}

impl GenericHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, executor_type: impl Into<String>, handler: Arc<dyn GenericNodeHandler>) {
        self.handlers.insert(executor_type.into(), handler);
    }

    pub fn get(&self, executor_type: &str) -> Option<&Arc<dyn GenericNodeHandler>> {
        self.handlers.get(executor_type)
    }
}

/// Outcome of one action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn success_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// In-process receiver for `send` actions.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, payload: &Value, ctx: &mut ExecutionContext<'_>) -> ActionResult;
}

/// Registry of in-process action handlers. A `send` action whose handler
/// is not registered here falls through to the tool transport.
#[derive(Default)]
pub struct ActionHandlerRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler_id: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(handler_id.into(), handler);
    }

    pub fn get(&self, handler_id: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(handler_id)
    }
}

/// Description of a tool available over the transport, fed to the
/// planner so dynamic plans know what they can call.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// Registry of tool descriptors.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.tools.push(ToolDescriptor {
            name: name.into(),
            description: description.into(),
        });
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// One `name: description` line per tool, for planner prompts.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
