//! Local replica of progress writes
//!
//! Keeps the most recent update per content item. Flushes can finish out of
//! order (a periodic flush still in flight when the teardown flush lands), so
//! entries are ordered by `(timestamp, sequence)` and a late arrival never
//! replaces a newer write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Config;
use crate::content::ContentId;
use crate::watch::{Flush, FlushPayload};

/// The newest known update for one content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedProgress {
    pub sequence: u64,
    /// Unix timestamp (ms) of the update
    pub timestamp: i64,
    pub payload: FlushPayload,
    /// The backend accepted this update
    #[serde(default)]
    pub acknowledged: bool,
}

impl CachedProgress {
    fn key(&self) -> (i64, u64) {
        (self.timestamp, self.sequence)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheFile {
    items: HashMap<ContentId, CachedProgress>,
}

/// Latest-wins progress cache, optionally backed by `progress.json`
#[derive(Debug, Clone, Default)]
pub struct ProgressCache {
    path: Option<PathBuf>,
    data: CacheFile,
}

impl ProgressCache {
    /// A cache that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the cache in the data directory
    pub fn open_default() -> Result<Self> {
        Self::open(Config::data_dir()?.join("progress.json"))
    }

    /// Open the cache at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read progress from {:?}", path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse progress.json")?
        } else {
            CacheFile::default()
        };

        Ok(Self { path: Some(path), data })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a flush; returns false if a newer update is already cached
    pub fn apply(&mut self, flush: &Flush) -> bool {
        let entry = CachedProgress {
            sequence: flush.sequence,
            timestamp: flush.payload.timestamp(),
            payload: flush.payload.clone(),
            acknowledged: false,
        };

        let content_id = flush.payload.content_id();
        match self.data.items.get(content_id) {
            Some(existing) if existing.key() >= entry.key() => {
                tracing::debug!(
                    content = content_id,
                    sequence = flush.sequence,
                    "ignoring stale update"
                );
                false
            }
            _ => {
                self.data.items.insert(content_id.to_string(), entry);
                true
            }
        }
    }

    /// Mark the cached update as accepted if it is still the one cached
    pub fn acknowledge(&mut self, content_id: &str, sequence: u64, timestamp: i64) {
        if let Some(entry) = self.data.items.get_mut(content_id) {
            if entry.key() == (timestamp, sequence) {
                entry.acknowledged = true;
            }
        }
    }

    pub fn get(&self, content_id: &str) -> Option<&CachedProgress> {
        self.data.items.get(content_id)
    }

    /// Updates the backend has not accepted yet
    pub fn unacknowledged(&self) -> impl Iterator<Item = &CachedProgress> {
        self.data.items.values().filter(|entry| !entry.acknowledged)
    }

    pub fn len(&self) -> usize {
        self.data.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.items.is_empty()
    }

    /// Save the cache to disk; a no-op for in-memory caches
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(&self.data)
            .with_context(|| "Failed to serialize progress")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write progress to {:?}", path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::WatchUpdate;
    use crate::watch::Delivery;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn flush(sequence: u64, timestamp: i64, position: f64) -> Flush {
        Flush {
            sequence,
            delivery: Delivery::Async,
            is_final: false,
            payload: FlushPayload::Video {
                video_id: "v1".into(),
                update: WatchUpdate { current_time: position, timestamp, ..Default::default() },
            },
        }
    }

    fn position(cache: &ProgressCache) -> f64 {
        match &cache.get("v1").unwrap().payload {
            FlushPayload::Video { update, .. } => update.current_time,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn late_arrival_does_not_overwrite() {
        let mut cache = ProgressCache::in_memory();
        assert!(cache.apply(&flush(2, 2_000, 95.0)));
        assert!(!cache.apply(&flush(1, 1_000, 60.0)));
        assert_eq!(position(&cache), 95.0);
    }

    #[test]
    fn same_timestamp_orders_by_sequence() {
        let mut cache = ProgressCache::in_memory();
        cache.apply(&flush(1, 1_000, 10.0));
        assert!(cache.apply(&flush(2, 1_000, 12.0)));
        assert!(!cache.apply(&flush(2, 1_000, 12.0)));
        assert_eq!(position(&cache), 12.0);
    }

    #[test]
    fn acknowledge_only_matches_current_entry() {
        let mut cache = ProgressCache::in_memory();
        cache.apply(&flush(1, 1_000, 10.0));
        cache.apply(&flush(2, 2_000, 20.0));

        cache.acknowledge("v1", 1, 1_000);
        assert_eq!(cache.unacknowledged().count(), 1);

        cache.acknowledge("v1", 2, 2_000);
        assert_eq!(cache.unacknowledged().count(), 0);
    }

    #[test]
    fn cache_persists_to_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");

        let mut cache = ProgressCache::open(&path).unwrap();
        cache.apply(&flush(3, 3_000, 42.0));
        cache.save().unwrap();

        let reopened = ProgressCache::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(position(&reopened), 42.0);
    }

    #[test]
    fn in_memory_save_is_noop() {
        let cache = ProgressCache::in_memory();
        assert!(cache.path().is_none());
        cache.save().unwrap();
    }
}
