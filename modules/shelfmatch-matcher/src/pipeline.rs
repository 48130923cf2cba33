use futures::StreamExt;
use shelfmatch_common::{MatchOutcome, MatchResult, ProductRecord, ShelfMatchError};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::EmbeddingCache;
use crate::embedder::Embedder;
use crate::index::SimilarityIndex;
use crate::retry::RetryPolicy;
use crate::verifier::MatchVerifier;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub top_k: usize,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            concurrency: 5,
            retry: RetryPolicy::default(),
        }
    }
}

/// Per-query-row matching: embed, retrieve top-k, verify, assemble.
///
/// The base table is embedded and indexed serially up front — the index
/// must be complete before any row can query it. Query rows then run on a
/// bounded worker pool; each row resolves to exactly one result and a
/// row-level failure never takes down the batch.
pub struct MatchPipeline {
    embedder: Embedder,
    verifier: MatchVerifier,
    cache: Mutex<EmbeddingCache>,
    opts: PipelineOptions,
}

impl MatchPipeline {
    pub fn new(
        embedder: Embedder,
        verifier: MatchVerifier,
        cache: EmbeddingCache,
        opts: PipelineOptions,
    ) -> Self {
        Self {
            embedder,
            verifier,
            cache: Mutex::new(cache),
            opts,
        }
    }

    pub async fn run(
        &self,
        base: &[ProductRecord],
        query: &[ProductRecord],
    ) -> Result<Vec<MatchResult>, ShelfMatchError> {
        if base.is_empty() {
            return Err(ShelfMatchError::Input("base table is empty".to_string()));
        }

        // Phase 1: embed the base catalog and build the index. Hard
        // ordering barrier before any parallelism.
        let base_names: Vec<String> = base.iter().map(|r| r.name.trim().to_string()).collect();
        self.embedder.embed_all(&self.cache, &base_names).await?;

        let vectors_by_row = {
            let cache = self.cache.lock().await;
            base_names
                .iter()
                .map(|name| cache.get(name).map(|v| v.to_vec()).unwrap_or_default())
                .collect()
        };
        let index = SimilarityIndex::build(vectors_by_row)?;

        // Phase 2: query rows in parallel with bounded concurrency.
        let rows: Vec<&ProductRecord> = query.iter().filter(|r| !r.name.trim().is_empty()).collect();
        let skipped = query.len() - rows.len();
        if skipped > 0 {
            warn!(skipped, "Skipping query rows with blank names");
        }
        info!(rows = rows.len(), workers = self.opts.concurrency, "Matching query rows");

        let results: Vec<MatchResult> = futures::stream::iter(
            rows.into_iter().map(|row| self.process_row(row, base, &index)),
        )
        .buffer_unordered(self.opts.concurrency.max(1))
        .collect()
        .await;

        let verified = results
            .iter()
            .filter(|r| r.outcome == MatchOutcome::Verified)
            .count();
        let best_guess = results
            .iter()
            .filter(|r| r.outcome == MatchOutcome::UnverifiedBestGuess)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.outcome == MatchOutcome::Failed)
            .count();
        info!(verified, best_guess, failed, skipped, "Matching run complete");

        Ok(results)
    }

    /// One query row, end to end. Always resolves to a result: retry
    /// exhaustion collapses to the `Failed` sentinel row instead of
    /// propagating.
    async fn process_row(
        &self,
        row: &ProductRecord,
        base: &[ProductRecord],
        index: &SimilarityIndex,
    ) -> MatchResult {
        let query_name = row.name.trim().to_string();

        let attempt = self
            .opts
            .retry
            .run(|| self.attempt_row(&query_name, row.price, base, index))
            .await;

        match attempt {
            Ok(result) => result,
            Err(e) => {
                warn!(query = query_name.as_str(), error = %e, "Row failed after retries");
                MatchResult::failed(query_name, row.price)
            }
        }
    }

    /// A single attempt. Data-quality dead ends (failure-sentinel
    /// embedding, no candidates) resolve to `Failed` directly — retrying
    /// cannot fix bad input. Remote errors come back as `Err` for the
    /// retry policy to handle.
    async fn attempt_row(
        &self,
        query_name: &str,
        query_price: Option<f64>,
        base: &[ProductRecord],
        index: &SimilarityIndex,
    ) -> anyhow::Result<MatchResult> {
        let vector = self.embedder.embed_one(&self.cache, query_name).await?;
        if vector.is_empty() {
            return Ok(MatchResult::failed(query_name, query_price));
        }

        let candidates = index.top_k(&vector, self.opts.top_k);
        if candidates.is_empty() {
            return Ok(MatchResult::failed(query_name, query_price));
        }

        let names: Vec<String> = candidates
            .iter()
            .map(|c| base[c.row].name.trim().to_string())
            .collect();

        match self.verifier.verify(query_name, &names).await? {
            Some(picked) => {
                let pos = names
                    .iter()
                    .position(|n| *n == picked)
                    .expect("verifier picks only supplied candidates");
                let candidate = candidates[pos];
                Ok(MatchResult::verified(
                    query_name,
                    picked,
                    query_price,
                    base[candidate.row].price,
                    candidate.similarity,
                ))
            }
            None => {
                let top = candidates[0];
                Ok(MatchResult::best_guess(
                    query_name,
                    base[top.row].name.trim(),
                    query_price,
                    base[top.row].price,
                    top.similarity,
                ))
            }
        }
    }
}
