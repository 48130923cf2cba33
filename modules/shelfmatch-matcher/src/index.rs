use shelfmatch_common::ShelfMatchError;
use tracing::{info, warn};

/// Norm below this is a failed or degenerate embedding, not a real vector.
const NORM_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    /// Index into the *original* base table, not the filtered view.
    pub row: usize,
    pub similarity: f32,
}

/// In-memory cosine index over the base table's embeddings.
///
/// Built once per run before any query row is processed, then read-only —
/// safe for unsynchronized concurrent reads from the worker pool. Lookup
/// is a linear scan; catalogs are far too small for anything fancier.
pub struct SimilarityIndex {
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    /// Maps filtered position back to the original base-table row.
    rows: Vec<usize>,
}

impl SimilarityIndex {
    /// Build from per-row base vectors. Rows whose vector is the failure
    /// sentinel or has ~zero norm are dropped before indexing; if nothing
    /// survives the run cannot produce a report and building fails.
    pub fn build(vectors_by_row: Vec<Vec<f32>>) -> Result<Self, ShelfMatchError> {
        let total = vectors_by_row.len();
        let mut vectors = Vec::new();
        let mut norms = Vec::new();
        let mut rows = Vec::new();

        for (row, vector) in vectors_by_row.into_iter().enumerate() {
            let norm = l2_norm(&vector);
            if norm < NORM_EPSILON {
                warn!(row, "Dropping base row with failed or zero-norm embedding");
                continue;
            }
            vectors.push(vector);
            norms.push(norm);
            rows.push(row);
        }

        if vectors.is_empty() {
            return Err(ShelfMatchError::Embedding(
                "no valid base embeddings to index".to_string(),
            ));
        }

        info!(indexed = vectors.len(), dropped = total - vectors.len(), "Built similarity index");
        Ok(Self {
            vectors,
            norms,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Top-k cosine matches for `query`, descending by similarity, ties
    /// kept in original table order. A zero-norm or dimension-mismatched
    /// query returns an empty list — an unmatchable query, not an error.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredCandidate> {
        let query_norm = l2_norm(query);
        if query_norm < NORM_EPSILON {
            return Vec::new();
        }

        let mut scored: Vec<ScoredCandidate> = self
            .vectors
            .iter()
            .zip(&self.norms)
            .zip(&self.rows)
            .filter(|((v, _), _)| v.len() == query.len())
            .map(|((vector, &norm), &row)| ScoredCandidate {
                row,
                similarity: dot(vector, query) / (norm * query_norm),
            })
            .collect();

        // Stable sort: equal similarities keep base-table order.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
