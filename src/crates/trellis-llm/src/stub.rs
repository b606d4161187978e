//! Stub provider backed by a process-wide response registry.
//!
//! Tests and local runs register canned responses per agent id; the stub
//! provider replays them in order and repeats the last one when the
//! sequence runs out. It always matches and carries the highest priority,
//! so a populated stub registry shadows any real provider.

use crate::error::{LlmError, Result};
use crate::traits::{AgentProvider, AgentRequest, AgentResponse};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Canned responses keyed by agent id.
#[derive(Debug, Default)]
pub struct StubResponses {
    responses: RwLock<HashMap<String, Vec<String>>>,
    cursors: RwLock<HashMap<String, usize>>,
}

impl StubResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one response for `agent_id`, appended to its sequence.
    pub fn register(&self, agent_id: impl Into<String>, response: impl Into<String>) {
        self.responses
            .write()
            .entry(agent_id.into())
            .or_default()
            .push(response.into());
    }

    /// Next response for `agent_id`; the sequence advances per call and
    /// sticks on its last entry.
    pub fn next_for(&self, agent_id: &str) -> Option<String> {
        let responses = self.responses.read();
        let sequence = responses.get(agent_id)?;
        let mut cursors = self.cursors.write();
        let cursor = cursors.entry(agent_id.to_string()).or_insert(0);
        let response = sequence.get(*cursor).or_else(|| sequence.last())?.clone();
        *cursor += 1;
        Some(response)
    }

    pub fn clear(&self) {
        self.responses.write().clear();
        self.cursors.write().clear();
    }
}

/// Provider that replays [`StubResponses`].
pub struct StubProvider {
    responses: Arc<StubResponses>,
}

impl StubProvider {
    pub fn new(responses: Arc<StubResponses>) -> Self {
        Self { responses }
    }
}

#[async_trait]
impl AgentProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn supports(&self, _model: &str) -> bool {
        true
    }

    fn priority(&self) -> i32 {
        i32::MAX
    }

    async fn complete(&self, request: AgentRequest) -> Result<AgentResponse> {
        match self.responses.next_for(&request.agent.id) {
            Some(content) => Ok(AgentResponse::new(content)),
            None => Err(LlmError::Provider {
                provider: "stub".to_string(),
                message: format!("no stub response registered for agent '{}'", request.agent.id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::AgentConfig;

    fn agent(id: &str) -> AgentConfig {
        AgentConfig {
            id: id.to_string(),
            model: "any".to_string(),
            temperature: 0.7,
            system_role: None,
            maintain_context: false,
        }
    }

    #[tokio::test]
    async fn test_replays_sequence_then_sticks() {
        let responses = Arc::new(StubResponses::new());
        responses.register("a", "first");
        responses.register("a", "second");

        let provider = StubProvider::new(responses);
        let req = |_: u32| AgentRequest::new(agent("a"), "p");

        assert_eq!(provider.complete(req(0)).await.unwrap().content, "first");
        assert_eq!(provider.complete(req(1)).await.unwrap().content, "second");
        assert_eq!(provider.complete(req(2)).await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn test_unregistered_agent_fails() {
        let provider = StubProvider::new(Arc::new(StubResponses::new()));
        let err = provider
            .complete(AgentRequest::new(agent("ghost"), "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Provider { .. }));
    }
}
