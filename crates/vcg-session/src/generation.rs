//! Generator collaborator

use crate::error::GenerationError;
use async_trait::async_trait;
use serde_json::Value;

/// Produces a subgraph payload from a prompt
///
/// The payload shape is `{ "nodes": [...], "edges": [...] }`; anything the
/// generator gets wrong is tolerated by
/// [`GeneratedSubgraph::from_value`](vcg_merge::GeneratedSubgraph::from_value).
#[async_trait]
pub trait Generator: Send + Sync {
    /// # Errors
    /// - `GenerationError::Failed` when the generator itself is unreachable
    async fn generate(&self, prompt: &str) -> Result<Value, GenerationError>;
}

/// Generator returning a fixed payload
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    payload: Value,
}

impl StaticGenerator {
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl Generator for StaticGenerator {
    async fn generate(&self, prompt: &str) -> Result<Value, GenerationError> {
        tracing::debug!(prompt_len = prompt.len(), "static generator invoked");
        Ok(self.payload.clone())
    }
}
