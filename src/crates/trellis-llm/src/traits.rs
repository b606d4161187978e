//! The provider trait the engine invokes agents through.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use trellis_core::AgentConfig;

/// One agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub agent: AgentConfig,
    /// Fully template-resolved prompt.
    pub prompt: String,
}

impl AgentRequest {
    pub fn new(agent: AgentConfig, prompt: impl Into<String>) -> Self {
        Self {
            agent,
            prompt: prompt.into(),
        }
    }
}

/// A provider's response.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl AgentResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }
}

/// A model provider. Providers are registered at startup and selected per
/// request: the highest-priority provider whose `supports` accepts the
/// model wins. Exactly one provider supplies each model; the stub
/// provider has the highest priority and always matches.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, model: &str) -> bool;

    fn priority(&self) -> i32 {
        0
    }

    async fn complete(&self, request: AgentRequest) -> Result<AgentResponse>;
}
