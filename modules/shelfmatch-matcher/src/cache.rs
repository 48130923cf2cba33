use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Durable text → embedding cache.
///
/// Unbounded and append-only: catalogs run hundreds to low thousands of
/// names, and a cached vector is cheap next to re-querying a paid API.
/// The empty vector is the failure sentinel for "embedding unavailable"
/// and round-trips through persistence like any other entry, so a failed
/// batch is not silently re-billed on the next run.
pub struct EmbeddingCache {
    /// `None` for the in-memory test variant; persistence is a no-op.
    path: Option<PathBuf>,
    entries: BTreeMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    /// Load the cache from `path`. A missing file is a valid cold start; a
    /// file that exists but does not parse is discarded with a warning
    /// rather than aborting the run.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            info!(path = %path.display(), "No embedding cache on disk, starting cold");
            return Ok(Self {
                path: Some(path),
                entries: BTreeMap::new(),
            });
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read embedding cache at {}", path.display()))?;

        let entries = match serde_json::from_str::<BTreeMap<String, Vec<f32>>>(&raw) {
            Ok(entries) => {
                info!(path = %path.display(), entries = entries.len(), "Loaded embedding cache");
                entries
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt embedding cache, starting cold");
                BTreeMap::new()
            }
        };

        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// In-memory cache with no backing file. Test-only convenience.
    #[cfg(any(test, feature = "test-support"))]
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, text: &str) -> Option<&[f32]> {
        self.entries.get(text).map(|v| v.as_slice())
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert entries and persist the whole blob. Persistence happens once
    /// per non-empty call, not per key, to bound I/O during batch fills.
    pub fn put_many(&mut self, entries: BTreeMap<String, Vec<f32>>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.entries.extend(entries);
        self.persist()
    }

    /// Write the full cache to disk via a sibling temp file and rename, so
    /// a crash mid-write never leaves a partial blob behind.
    fn persist(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let blob = serde_json::to_string(&self.entries).context("Failed to serialize cache")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, blob)
            .with_context(|| format!("Failed to write cache to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move cache into place at {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::load(dir.path().join("nope.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupt_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json at all {{{").unwrap();

        let cache = EmbeddingCache::load(&path).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn put_many_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = EmbeddingCache::load(&path).unwrap();
        let mut entries = BTreeMap::new();
        entries.insert("Eucerin Sun Gel SPF50".to_string(), vec![0.1, 0.2, 0.3]);
        entries.insert("failed name".to_string(), vec![]);
        cache.put_many(entries).unwrap();

        let reloaded = EmbeddingCache::load(&path).unwrap();
        assert_eq!(
            reloaded.get("Eucerin Sun Gel SPF50"),
            Some(&[0.1f32, 0.2, 0.3][..])
        );
        // Failure sentinel survives persistence as an empty vector.
        assert_eq!(reloaded.get("failed name"), Some(&[][..]));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn persisted_blob_is_stable_across_insert_order() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.json");
        let path_b = dir.path().join("b.json");

        let mut first = EmbeddingCache::load(&path_a).unwrap();
        first
            .put_many(BTreeMap::from([("zinc cream".to_string(), vec![0.2])]))
            .unwrap();
        first
            .put_many(BTreeMap::from([("aloe gel".to_string(), vec![0.1])]))
            .unwrap();

        let mut second = EmbeddingCache::load(&path_b).unwrap();
        second
            .put_many(BTreeMap::from([("aloe gel".to_string(), vec![0.1])]))
            .unwrap();
        second
            .put_many(BTreeMap::from([("zinc cream".to_string(), vec![0.2])]))
            .unwrap();

        let blob_a = std::fs::read_to_string(&path_a).unwrap();
        let blob_b = std::fs::read_to_string(&path_b).unwrap();
        assert_eq!(blob_a, blob_b);
    }

    #[test]
    fn get_is_idempotent_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = EmbeddingCache::load(&path).unwrap();
        cache
            .put_many(BTreeMap::from([("a".to_string(), vec![1.0, 0.0])]))
            .unwrap();

        let first = cache.get("a").map(|v| v.to_vec());
        let second = cache.get("a").map(|v| v.to_vec());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_put_many_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = EmbeddingCache::load(&path).unwrap();
        cache.put_many(BTreeMap::new()).unwrap();
        assert!(!path.exists());
    }
}
