use serde::Serialize;
use shelfmatch_common::MatchResult;
use tracing::info;

/// How the price comparison column is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceMode {
    /// `query_price / matched_price` — how the query side prices relative
    /// to the base side.
    Ratio,
    /// `matched_price - query_price` — signed absolute difference.
    Difference,
}

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub similarity_threshold: f32,
    pub require_verified: bool,
    pub price_mode: PriceMode,
    /// When set, rows whose price *ratio* falls outside these bounds are
    /// dropped: a verified match priced wildly apart is more likely a
    /// wrong match than a real discount.
    pub ratio_bounds: Option<(f64, f64)>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            require_verified: true,
            price_mode: PriceMode::Ratio,
            ratio_bounds: None,
        }
    }
}

/// One row of the final comparison table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub query_name: String,
    pub matched_name: String,
    pub query_price: Option<f64>,
    pub matched_price: Option<f64>,
    pub similarity: f32,
    pub price_diff: Option<f64>,
}

/// Threshold the raw results down to the high-confidence comparison table.
pub fn assemble(results: &[MatchResult], opts: &ReportOptions) -> Vec<ReportRow> {
    let rows: Vec<ReportRow> = results
        .iter()
        .filter(|r| r.similarity >= opts.similarity_threshold)
        .filter(|r| !opts.require_verified || r.verified)
        .filter(|r| match opts.ratio_bounds {
            Some((lo, hi)) => match price_ratio(r) {
                Some(ratio) => ratio > lo && ratio < hi,
                None => false,
            },
            None => true,
        })
        .map(|r| ReportRow {
            query_name: r.query_name.clone(),
            matched_name: r.matched_name.clone(),
            query_price: r.query_price,
            matched_price: r.matched_price,
            similarity: r.similarity,
            price_diff: price_diff(r, opts.price_mode),
        })
        .collect();

    info!(
        input = results.len(),
        reported = rows.len(),
        threshold = opts.similarity_threshold,
        "Assembled comparison report"
    );
    rows
}

fn price_ratio(r: &MatchResult) -> Option<f64> {
    match (r.query_price, r.matched_price) {
        (Some(q), Some(m)) if m != 0.0 => Some(q / m),
        _ => None,
    }
}

fn price_diff(r: &MatchResult, mode: PriceMode) -> Option<f64> {
    match mode {
        PriceMode::Ratio => price_ratio(r),
        PriceMode::Difference => match (r.query_price, r.matched_price) {
            (Some(q), Some(m)) => Some(m - q),
            _ => None,
        },
    }
}
