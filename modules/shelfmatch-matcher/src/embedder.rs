use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ai_client::EmbedAgent;
use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::EmbeddingCache;

/// Pause between consecutive embedding batches. Advisory pacing for soft
/// rate limits, not a correctness requirement.
const BATCH_PACING: Duration = Duration::from_millis(500);

/// Cache-aware wrapper over an [`EmbedAgent`].
///
/// Deduplicates requested texts, never re-embeds anything already cached,
/// never sends blank text, and converts whole-batch provider failures into
/// the empty-vector sentinel so one bad batch cannot abort a run.
pub struct Embedder {
    agent: Arc<dyn EmbedAgent>,
    batch_size: usize,
    pacing: Duration,
}

impl Embedder {
    pub fn new(agent: Arc<dyn EmbedAgent>, batch_size: usize) -> Self {
        Self {
            agent,
            batch_size: batch_size.max(1),
            pacing: BATCH_PACING,
        }
    }

    /// Override inter-batch pacing. Tests pass `Duration::ZERO`.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Ensure every distinct non-blank text in `texts` has a cache entry,
    /// filling misses through the remote model in batches. Each batch is
    /// persisted as soon as it lands; a failed batch marks all of its
    /// texts with the failure sentinel and the run continues.
    pub async fn embed_all(&self, cache: &Mutex<EmbeddingCache>, texts: &[String]) -> Result<()> {
        let mut misses: Vec<String> = Vec::new();
        {
            let cache = cache.lock().await;
            for text in texts {
                let text = text.trim();
                if text.is_empty() || cache.contains(text) {
                    continue;
                }
                if !misses.iter().any(|m| m == text) {
                    misses.push(text.to_string());
                }
            }
        }

        if misses.is_empty() {
            debug!(requested = texts.len(), "All texts already cached");
            return Ok(());
        }

        let batches: Vec<&[String]> = misses.chunks(self.batch_size).collect();
        let batch_count = batches.len();
        info!(
            misses = misses.len(),
            batches = batch_count,
            "Embedding uncached texts"
        );

        for (i, batch) in batches.into_iter().enumerate() {
            let entries = self.embed_batch_or_sentinel(batch).await;
            cache.lock().await.put_many(entries)?;

            if batch_count > 1 && i + 1 < batch_count && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        Ok(())
    }

    /// Cache-or-fetch for a single text. Unlike the batch fill, a remote
    /// failure here propagates as `Err` — the caller's per-row retry owns
    /// it, and nothing is written to the cache.
    pub async fn embed_one(&self, cache: &Mutex<EmbeddingCache>, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("refusing to embed blank text");
        }

        if let Some(vector) = cache.lock().await.get(text) {
            return Ok(vector.to_vec());
        }

        let vector = self.agent.embed(text).await?;

        let mut entries = BTreeMap::new();
        entries.insert(text.to_string(), vector.clone());
        cache.lock().await.put_many(entries)?;

        Ok(vector)
    }

    /// One remote batch call. The provider contract returns vectors in
    /// input order; a length mismatch means that contract is broken, and
    /// the batch is treated as failed rather than mis-zipped.
    async fn embed_batch_or_sentinel(&self, batch: &[String]) -> BTreeMap<String, Vec<f32>> {
        match self.agent.embed_batch(batch).await {
            Ok(vectors) if vectors.len() == batch.len() => batch
                .iter()
                .cloned()
                .zip(vectors)
                .collect(),
            Ok(vectors) => {
                warn!(
                    requested = batch.len(),
                    returned = vectors.len(),
                    "Embedding batch length mismatch, marking batch failed"
                );
                Self::sentinel_entries(batch)
            }
            Err(e) => {
                warn!(batch_size = batch.len(), error = %e, "Embedding batch failed, marking and continuing");
                Self::sentinel_entries(batch)
            }
        }
    }

    fn sentinel_entries(batch: &[String]) -> BTreeMap<String, Vec<f32>> {
        batch.iter().map(|t| (t.clone(), Vec::new())).collect()
    }
}
