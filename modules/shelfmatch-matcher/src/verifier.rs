use std::sync::Arc;

use ai_client::ChatAgent;
use anyhow::Result;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are an AI assistant that determines if products are \
the same based on their names. If a product from the list is the same as the base \
product, you must respond with the exact name of the product from the list. If no \
product is the same, you must respond with 'None'.";

/// LLM-backed precision filter over the similarity candidates.
///
/// One prompt per call. The raw completion is accepted only when it is
/// byte-for-byte equal to one of the supplied candidate names; anything
/// else — including a near-miss with different whitespace — is "no match".
/// Strict on purpose: it trades occasional false negatives for zero
/// hallucinated matches.
pub struct MatchVerifier {
    agent: Arc<dyn ChatAgent>,
}

impl MatchVerifier {
    pub fn new(agent: Arc<dyn ChatAgent>) -> Self {
        Self { agent }
    }

    /// Ask the model which candidate (if any) names the same product as
    /// `query_name`. Transport errors propagate; the caller's retry policy
    /// owns them.
    pub async fn verify(&self, query_name: &str, candidates: &[String]) -> Result<Option<String>> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let list = candidates
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Please verify if any of the products in the following list are the same as \
the base product. Base product: '{query_name}'. Comparison list:\n{list}\n\nRespond \
with the name of the product from the list that is the same, or 'None' if no product \
is the same."
        );

        let raw = self.agent.chat_completion(SYSTEM_PROMPT, &prompt).await?;
        let answer = raw.trim();

        let picked = candidates.iter().find(|c| c.as_str() == answer).cloned();
        debug!(
            query = query_name,
            answer,
            matched = picked.is_some(),
            "Verifier response"
        );
        Ok(picked)
    }
}
