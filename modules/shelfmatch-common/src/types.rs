use serde::{Deserialize, Serialize};

// --- Catalog types ---

/// Which side of the comparison a record came from. A combined extract is
/// split on this before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Base,
    Query,
}

/// One scraped product listing. The trimmed name is the only join key the
/// matcher has; upstream guarantees no numeric IDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub price: Option<f64>,
    pub source: Source,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, price: Option<f64>, source: Source) -> Self {
        Self {
            name: name.into(),
            price,
            source,
        }
    }
}

// --- Match results ---

/// Placeholder name emitted when a row exhausts its retries or its own
/// embedding is unusable. Kept human-readable so it stands out when
/// scanning the report.
pub const MATCHING_FAILED: &str = "Matching Failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// The verifier selected this candidate by exact name.
    Verified,
    /// Verifier declined; top-similarity candidate retained for visibility.
    UnverifiedBestGuess,
    /// Row-level failure sentinel. Never silently dropped.
    Failed,
}

/// One row of the raw comparison table. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub query_name: String,
    pub matched_name: String,
    pub query_price: Option<f64>,
    pub matched_price: Option<f64>,
    pub similarity: f32,
    pub verified: bool,
    pub outcome: MatchOutcome,
}

impl MatchResult {
    pub fn verified(
        query_name: impl Into<String>,
        matched_name: impl Into<String>,
        query_price: Option<f64>,
        matched_price: Option<f64>,
        similarity: f32,
    ) -> Self {
        Self {
            query_name: query_name.into(),
            matched_name: matched_name.into(),
            query_price,
            matched_price,
            similarity,
            verified: true,
            outcome: MatchOutcome::Verified,
        }
    }

    pub fn best_guess(
        query_name: impl Into<String>,
        matched_name: impl Into<String>,
        query_price: Option<f64>,
        matched_price: Option<f64>,
        similarity: f32,
    ) -> Self {
        Self {
            query_name: query_name.into(),
            matched_name: matched_name.into(),
            query_price,
            matched_price,
            similarity,
            verified: false,
            outcome: MatchOutcome::UnverifiedBestGuess,
        }
    }

    pub fn failed(query_name: impl Into<String>, query_price: Option<f64>) -> Self {
        Self {
            query_name: query_name.into(),
            matched_name: MATCHING_FAILED.to_string(),
            query_price,
            matched_price: Some(0.0),
            similarity: 0.0,
            verified: false,
            outcome: MatchOutcome::Failed,
        }
    }
}
