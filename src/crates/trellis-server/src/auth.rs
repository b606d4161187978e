//! Bearer-token tenant extraction.
//!
//! Token verification itself is pluggable: the default verifier maps
//! statically registered tokens to tenant ids, which is what tests and
//! single-box deployments use. A JWT-validating implementation plugs in
//! behind the same trait without touching handlers.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use trellis_engine::TenantContext;

use crate::error::{ApiError, Result};

/// Resolves a bearer token to a tenant id.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<String>;
}

/// Static token -> tenant map, populated at startup.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, token: impl Into<String>, tenant_id: impl Into<String>) {
        self.tokens.insert(token.into(), tenant_id.into());
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// Extract the tenant from the `Authorization: Bearer` header.
pub fn authenticate(verifier: &Arc<dyn TokenVerifier>, headers: &HeaderMap) -> Result<TenantContext> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("expected bearer token".to_string()))?;

    verifier
        .verify(token)
        .map(TenantContext::new)
        .ok_or_else(|| ApiError::Unauthorized("invalid token".to_string()))
}
