use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use shelfmatch_common::{MatchResult, ProductRecord, Source};
use tracing::info;

use crate::report::ReportRow;

#[derive(Debug, Deserialize)]
struct RawRow {
    product_name: String,
    sale_price: Option<f64>,
}

/// Read a `(product_name, sale_price)` CSV into product records. Names are
/// trimmed; rows with blank names are skipped at ingest (the matcher never
/// sees them, so `|results| == |non-blank query rows|` holds downstream).
pub fn read_products(path: impl AsRef<Path>, source: Source) -> Result<Vec<ProductRecord>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open product table at {}", path.display()))?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in reader.deserialize() {
        let row: RawRow =
            row.with_context(|| format!("Malformed row in {}", path.display()))?;
        let name = row.product_name.trim();
        if name.is_empty() {
            skipped += 1;
            continue;
        }
        records.push(ProductRecord::new(name, row.sale_price, source));
    }

    info!(path = %path.display(), rows = records.len(), skipped, "Loaded product table");
    Ok(records)
}

/// Write the raw per-row results, sentinel rows included, for manual
/// review.
pub fn write_results(path: impl AsRef<Path>, results: &[MatchResult]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create results file at {}", path.display()))?;
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = results.len(), "Wrote raw results");
    Ok(())
}

/// Write the filtered comparison report.
pub fn write_report(path: impl AsRef<Path>, rows: &[ReportRow]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create report file at {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "Wrote comparison report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_and_skips_blank_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");
        std::fs::write(
            &path,
            "product_name,sale_price\nEucerin Sun Gel SPF50,590.0\n  ,100.0\nPlain Soap,\n",
        )
        .unwrap();

        let records = read_products(&path, Source::Base).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Eucerin Sun Gel SPF50");
        assert_eq!(records[0].price, Some(590.0));
        assert_eq!(records[1].name, "Plain Soap");
        assert_eq!(records[1].price, None);
    }

    #[test]
    fn names_are_trimmed_at_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");
        std::fs::write(&path, "product_name,sale_price\n  Padded Name  ,10.5\n").unwrap();

        let records = read_products(&path, Source::Query).unwrap();
        assert_eq!(records[0].name, "Padded Name");
    }

    #[test]
    fn results_round_trip_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        let results = vec![
            MatchResult::verified("a", "b", Some(1.0), Some(2.0), 0.9),
            MatchResult::failed("c", None),
        ];
        write_results(&path, &results).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Matching Failed"));
        assert_eq!(written.lines().count(), 3); // header + 2 rows
    }
}
