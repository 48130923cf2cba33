use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
///
/// Thresholds and limits are deliberately tunable: observed runs of the
/// upstream comparison differ on similarity cutoff (0.8 vs 0.82) and ratio
/// bounds with no documented rationale, so none of these are contracts.
#[derive(Debug, Clone)]
pub struct Config {
    // AI provider
    pub openai_api_key: String,
    pub embedding_model: String,
    pub chat_model: String,

    // Matching
    pub similarity_threshold: f32,
    pub top_k: usize,
    pub concurrency: usize,
    pub embed_batch_size: usize,
    /// `min,max` acceptable price ratio; rows outside are dropped from the
    /// report. Unset means no bounds filtering.
    pub ratio_bounds: Option<(f64, f64)>,

    // Cache
    pub cache_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: required_env("OPENAI_API_KEY"),
            embedding_model: env::var("SHELFMATCH_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            chat_model: env::var("SHELFMATCH_CHAT_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            similarity_threshold: parsed_env("SHELFMATCH_SIMILARITY_THRESHOLD", 0.8),
            top_k: parsed_env("SHELFMATCH_TOP_K", 3),
            concurrency: parsed_env("SHELFMATCH_CONCURRENCY", 5),
            embed_batch_size: parsed_env("SHELFMATCH_EMBED_BATCH_SIZE", 100),
            ratio_bounds: ratio_bounds_env("SHELFMATCH_RATIO_BOUNDS"),
            cache_path: env::var("SHELFMATCH_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("embeddings_cache.json")),
        }
    }

    /// Log the effective configuration without the API key.
    pub fn log_redacted(&self) {
        tracing::info!(
            embedding_model = self.embedding_model.as_str(),
            chat_model = self.chat_model.as_str(),
            similarity_threshold = self.similarity_threshold,
            top_k = self.top_k,
            concurrency = self.concurrency,
            embed_batch_size = self.embed_batch_size,
            ratio_bounds = ?self.ratio_bounds,
            cache_path = %self.cache_path.display(),
            "Loaded config"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number, got: {raw}")),
        Err(_) => default,
    }
}

fn ratio_bounds_env(key: &str) -> Option<(f64, f64)> {
    let raw = env::var(key).ok()?;
    Some(
        parse_ratio_bounds(&raw)
            .unwrap_or_else(|| panic!("{key} must be 'min,max' (e.g. 0.5,1.5), got: {raw}")),
    )
}

fn parse_ratio_bounds(raw: &str) -> Option<(f64, f64)> {
    let (lo, hi) = raw.split_once(',')?;
    let lo: f64 = lo.trim().parse().ok()?;
    let hi: f64 = hi.trim().parse().ok()?;
    if lo >= hi {
        return None;
    }
    Some((lo, hi))
}
