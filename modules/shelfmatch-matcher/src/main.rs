use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use shelfmatch_common::{Config, Source};
use shelfmatch_matcher::cache::EmbeddingCache;
use shelfmatch_matcher::embedder::Embedder;
use shelfmatch_matcher::pipeline::{MatchPipeline, PipelineOptions};
use shelfmatch_matcher::report::{self, PriceMode, ReportOptions};
use shelfmatch_matcher::retry::RetryPolicy;
use shelfmatch_matcher::tables;
use shelfmatch_matcher::verifier::MatchVerifier;

/// Match product listings across two scraped catalogs and compare prices.
#[derive(Parser)]
#[command(name = "shelfmatch")]
struct Cli {
    /// CSV of the catalog being searched (product_name, sale_price)
    base: PathBuf,

    /// CSV of the products being looked up (product_name, sale_price)
    query: PathBuf,

    /// Where to write the filtered comparison report
    #[arg(long, default_value = "comparison_report.csv")]
    output: PathBuf,

    /// Also write the unfiltered per-row results here
    #[arg(long)]
    raw_output: Option<PathBuf>,

    /// Override the similarity threshold from config
    #[arg(long)]
    threshold: Option<f32>,

    /// Override the candidate count from config
    #[arg(long)]
    top_k: Option<usize>,

    /// Override the worker count from config
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override the embedding cache path from config
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Price comparison column variant
    #[arg(long, value_enum, default_value = "ratio")]
    price_mode: PriceModeArg,

    /// Drop rows whose price ratio falls outside min-ratio..max-ratio
    /// (defaults to SHELFMATCH_RATIO_BOUNDS when unset)
    #[arg(long, requires = "max_ratio")]
    min_ratio: Option<f64>,
    #[arg(long, requires = "min_ratio")]
    max_ratio: Option<f64>,

    /// Keep similarity-only best guesses in the report
    #[arg(long)]
    include_unverified: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PriceModeArg {
    Ratio,
    Difference,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shelfmatch=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    info!("Shelfmatch starting...");

    let base = tables::read_products(&cli.base, Source::Base)?;
    let query = tables::read_products(&cli.query, Source::Query)?;

    let agent = Arc::new(
        OpenAi::new(&config.openai_api_key, &config.chat_model)
            .with_embedding_model(&config.embedding_model),
    );

    let cache_path = cli.cache.unwrap_or(config.cache_path);
    let cache = EmbeddingCache::load(&cache_path)?;

    let pipeline = MatchPipeline::new(
        Embedder::new(agent.clone(), config.embed_batch_size),
        MatchVerifier::new(agent),
        cache,
        PipelineOptions {
            top_k: cli.top_k.unwrap_or(config.top_k),
            concurrency: cli.concurrency.unwrap_or(config.concurrency),
            retry: RetryPolicy::default(),
        },
    );

    let results = pipeline.run(&base, &query).await?;

    if let Some(raw_path) = cli.raw_output {
        tables::write_results(&raw_path, &results)?;
    }

    let report_opts = ReportOptions {
        similarity_threshold: cli.threshold.unwrap_or(config.similarity_threshold),
        require_verified: !cli.include_unverified,
        price_mode: match cli.price_mode {
            PriceModeArg::Ratio => PriceMode::Ratio,
            PriceModeArg::Difference => PriceMode::Difference,
        },
        ratio_bounds: cli.min_ratio.zip(cli.max_ratio).or(config.ratio_bounds),
    };
    let rows = report::assemble(&results, &report_opts);
    tables::write_report(&cli.output, &rows)?;

    info!(report = %cli.output.display(), rows = rows.len(), "Done");
    Ok(())
}
