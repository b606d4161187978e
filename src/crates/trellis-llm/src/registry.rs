//! Provider registry: explicit registration, priority-ordered resolution.

use crate::error::{LlmError, Result};
use crate::traits::{AgentProvider, AgentRequest, AgentResponse};
use std::sync::Arc;
use tracing::debug;
use trellis_core::AgentConfig;

/// Resolves agent invocations to a registered [`AgentProvider`].
///
/// Registration happens at startup; the registry is then shared read-only
/// across executions.
#[derive(Default)]
pub struct AgentRegistry {
    providers: Vec<Arc<dyn AgentProvider>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, keeping the list sorted by descending
    /// priority so resolution is a linear scan to the first match.
    pub fn register(&mut self, provider: Arc<dyn AgentProvider>) {
        self.providers.push(provider);
        self.providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// The provider serving `model`, if any.
    pub fn resolve(&self, model: &str) -> Option<&Arc<dyn AgentProvider>> {
        self.providers.iter().find(|p| p.supports(model))
    }

    /// Invoke `agent` with a resolved prompt.
    pub async fn invoke(&self, agent: &AgentConfig, prompt: &str) -> Result<AgentResponse> {
        let provider = self
            .resolve(&agent.model)
            .ok_or_else(|| LlmError::NoProvider(agent.model.clone()))?;
        debug!(agent = %agent.id, model = %agent.model, provider = provider.name(), "invoking agent");
        provider
            .complete(AgentRequest::new(agent.clone(), prompt))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedProvider {
        name: &'static str,
        model: &'static str,
        priority: i32,
    }

    #[async_trait]
    impl AgentProvider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn supports(&self, model: &str) -> bool {
            model == self.model || self.model == "*"
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn complete(&self, _request: AgentRequest) -> Result<AgentResponse> {
            Ok(AgentResponse::new(self.name))
        }
    }

    fn agent(model: &str) -> AgentConfig {
        AgentConfig {
            id: "a".to_string(),
            model: model.to_string(),
            temperature: 0.7,
            system_role: None,
            maintain_context: false,
        }
    }

    #[tokio::test]
    async fn test_highest_priority_provider_wins() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(FixedProvider {
            name: "low",
            model: "*",
            priority: 0,
        }));
        registry.register(Arc::new(FixedProvider {
            name: "high",
            model: "*",
            priority: 100,
        }));

        let response = registry.invoke(&agent("anything"), "hi").await.unwrap();
        assert_eq!(response.content, "high");
    }

    #[tokio::test]
    async fn test_unknown_model_errors() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(FixedProvider {
            name: "gpt",
            model: "gpt-4",
            priority: 0,
        }));

        let err = registry.invoke(&agent("claude"), "hi").await.unwrap_err();
        assert!(matches!(err, LlmError::NoProvider(_)));
    }
}
