//! End-to-end pipeline tests against fake agents. No network, no real
//! cache file, zero backoff and pacing so the suite runs instantly.

use std::sync::Arc;
use std::time::Duration;

use shelfmatch_common::{MatchOutcome, ProductRecord, ShelfMatchError, Source, MATCHING_FAILED};
use shelfmatch_matcher::cache::EmbeddingCache;
use shelfmatch_matcher::embedder::Embedder;
use shelfmatch_matcher::pipeline::{MatchPipeline, PipelineOptions};
use shelfmatch_matcher::retry::RetryPolicy;
use shelfmatch_matcher::testing::{FakeChatAgent, FakeEmbedAgent};
use shelfmatch_matcher::verifier::MatchVerifier;

fn base_row(name: &str, price: f64) -> ProductRecord {
    ProductRecord::new(name, Some(price), Source::Base)
}

fn query_row(name: &str, price: f64) -> ProductRecord {
    ProductRecord::new(name, Some(price), Source::Query)
}

fn pipeline(embed: Arc<FakeEmbedAgent>, chat: Arc<FakeChatAgent>) -> MatchPipeline {
    MatchPipeline::new(
        Embedder::new(embed, 100).with_pacing(Duration::ZERO),
        MatchVerifier::new(chat),
        EmbeddingCache::ephemeral(),
        PipelineOptions {
            top_k: 3,
            concurrency: 5,
            retry: RetryPolicy::new(3, Duration::ZERO),
        },
    )
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verified_match_carries_base_price_and_similarity() {
    let embed = Arc::new(
        FakeEmbedAgent::new()
            .with_vector("Eucerin Sun Gel SPF50", vec![1.0, 0.1])
            .with_vector("Plain Soap", vec![0.0, 1.0])
            .with_vector("Eucerin Sun Gel SPF 50 150ml", vec![1.0, 0.12]),
    );
    let chat = Arc::new(FakeChatAgent::replying("Eucerin Sun Gel SPF50"));

    let base = vec![
        base_row("Eucerin Sun Gel SPF50", 590.0),
        base_row("Plain Soap", 45.0),
    ];
    let query = vec![query_row("Eucerin Sun Gel SPF 50 150ml", 550.0)];

    let results = pipeline(embed, chat).run(&base, &query).await.unwrap();

    assert_eq!(results.len(), 1);
    let row = &results[0];
    assert!(row.verified);
    assert_eq!(row.outcome, MatchOutcome::Verified);
    assert_eq!(row.matched_name, "Eucerin Sun Gel SPF50");
    assert_eq!(row.matched_price, Some(590.0));
    assert_eq!(row.query_price, Some(550.0));
    assert!(row.similarity >= 0.8);
}

#[tokio::test]
async fn declined_verification_keeps_top_candidate_as_best_guess() {
    let embed = Arc::new(
        FakeEmbedAgent::new()
            .with_vector("Gel A", vec![1.0, 0.0])
            .with_vector("Gel B", vec![0.9, 0.1])
            .with_vector("some query", vec![1.0, 0.05]),
    );
    let chat = Arc::new(FakeChatAgent::no_match());

    let base = vec![base_row("Gel A", 100.0), base_row("Gel B", 120.0)];
    let query = vec![query_row("some query", 90.0)];

    let results = pipeline(embed, chat).run(&base, &query).await.unwrap();

    let row = &results[0];
    assert!(!row.verified);
    assert_eq!(row.outcome, MatchOutcome::UnverifiedBestGuess);
    assert_eq!(row.matched_name, "Gel A");
    assert_eq!(row.matched_price, Some(100.0));
}

// ---------------------------------------------------------------------------
// Blank and failed queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_query_names_are_excluded_from_output() {
    let embed = Arc::new(
        FakeEmbedAgent::new()
            .with_vector("Base", vec![1.0, 0.0])
            .with_vector("real query", vec![1.0, 0.0]),
    );
    let chat = Arc::new(FakeChatAgent::replying("Base"));

    let base = vec![base_row("Base", 10.0)];
    let query = vec![
        query_row("", 1.0),
        query_row("   ", 2.0),
        query_row("real query", 3.0),
    ];

    let results = pipeline(embed, chat).run(&base, &query).await.unwrap();

    // |results| == |query rows with non-blank names|
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].query_name, "real query");
}

#[tokio::test]
async fn sentinel_query_embedding_fails_row_without_calling_verifier() {
    // The query's cached embedding is the failure sentinel (empty vector).
    let embed = Arc::new(
        FakeEmbedAgent::new()
            .with_vector("Base", vec![1.0, 0.0])
            .with_vector("poison query", vec![]),
    );
    let chat = Arc::new(FakeChatAgent::replying("Base"));

    let base = vec![base_row("Base", 10.0)];
    let query = vec![query_row("poison query", 99.0)];

    let results = pipeline(embed, chat.clone()).run(&base, &query).await.unwrap();

    let row = &results[0];
    assert_eq!(row.outcome, MatchOutcome::Failed);
    assert_eq!(row.matched_name, MATCHING_FAILED);
    assert_eq!(row.matched_price, Some(0.0));
    assert_eq!(row.similarity, 0.0);
    assert_eq!(chat.calls(), 0);
}

// ---------------------------------------------------------------------------
// Retry behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_verifier_errors_are_retried_to_success() {
    let embed = Arc::new(
        FakeEmbedAgent::new()
            .with_vector("Base", vec![1.0, 0.0])
            .with_vector("query", vec![1.0, 0.0]),
    );
    let chat = Arc::new(FakeChatAgent::replying("Base").failing_first(2));

    let base = vec![base_row("Base", 10.0)];
    let query = vec![query_row("query", 9.0)];

    let results = pipeline(embed, chat.clone()).run(&base, &query).await.unwrap();

    assert_eq!(results[0].outcome, MatchOutcome::Verified);
    assert_eq!(chat.calls(), 3);
}

#[tokio::test]
async fn exhausted_retries_emit_the_failed_sentinel_row() {
    let embed = Arc::new(
        FakeEmbedAgent::new()
            .with_vector("Base", vec![1.0, 0.0])
            .with_vector("good query", vec![1.0, 0.0])
            .with_vector("doomed query", vec![0.9, 0.1]),
    );
    // Verifier always errors; every row exhausts its retries.
    let chat = Arc::new(FakeChatAgent::failing());

    let base = vec![base_row("Base", 10.0)];
    let query = vec![query_row("good query", 9.0), query_row("doomed query", 8.0)];

    let results = pipeline(embed, chat).run(&base, &query).await.unwrap();

    // Failed rows are emitted, never dropped.
    assert_eq!(results.len(), 2);
    for row in &results {
        assert_eq!(row.outcome, MatchOutcome::Failed);
        assert_eq!(row.matched_name, MATCHING_FAILED);
        assert!(!row.verified);
    }
}

// ---------------------------------------------------------------------------
// Run-level preconditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_base_table_is_fatal() {
    let embed = Arc::new(FakeEmbedAgent::new());
    let chat = Arc::new(FakeChatAgent::no_match());

    let result = pipeline(embed, chat)
        .run(&[], &[query_row("q", 1.0)])
        .await;

    assert!(matches!(result, Err(ShelfMatchError::Input(_))));
}

#[tokio::test]
async fn all_base_embeddings_failing_is_fatal() {
    // Single batch fails; every base row gets the sentinel, the index has
    // nothing to hold, and the run aborts with a diagnostic.
    let embed = Arc::new(FakeEmbedAgent::new().failing_batches(1));
    let chat = Arc::new(FakeChatAgent::no_match());

    let base = vec![base_row("A", 1.0), base_row("B", 2.0)];
    let result = pipeline(embed, chat).run(&base, &[query_row("q", 1.0)]).await;

    assert!(matches!(result, Err(ShelfMatchError::Embedding(_))));
}

#[tokio::test]
async fn partial_base_batch_failure_still_matches_remaining_rows() {
    // Batch size 2 splits the base into [A, B] and [C]; the first batch
    // fails and gets sentinels, but C survives and the run continues.
    let embed = Arc::new(
        FakeEmbedAgent::new()
            .with_vector("C", vec![1.0, 0.0])
            .with_vector("query", vec![1.0, 0.0])
            .failing_batches(1),
    );
    let chat = Arc::new(FakeChatAgent::replying("C"));

    let base = vec![base_row("A", 1.0), base_row("B", 2.0), base_row("C", 3.0)];
    let query = vec![query_row("query", 4.0)];

    let pipeline = MatchPipeline::new(
        Embedder::new(embed, 2).with_pacing(Duration::ZERO),
        MatchVerifier::new(chat),
        EmbeddingCache::ephemeral(),
        PipelineOptions {
            top_k: 3,
            concurrency: 5,
            retry: RetryPolicy::new(3, Duration::ZERO),
        },
    );
    let results = pipeline.run(&base, &query).await.unwrap();

    assert_eq!(results[0].outcome, MatchOutcome::Verified);
    assert_eq!(results[0].matched_name, "C");
    assert_eq!(results[0].matched_price, Some(3.0));
}
