use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// EmbedAgent Trait
// =============================================================================

/// Text embedding provider. The batch call must return one vector per input
/// text, in input order — callers rely on positional correspondence.
#[async_trait]
pub trait EmbedAgent: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

// =============================================================================
// ChatAgent Trait
// =============================================================================

/// Single-turn chat completion: one system prompt, one user prompt, one
/// short text reply. Sampling is deterministic (temperature 0) so repeated
/// calls on identical input are reproducible.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn chat_completion(&self, system: &str, user: &str) -> Result<String>;
}
