// Named cache partitions keyed by request URL, modelled on the browser cache storage API.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::request::FetchResponse;

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if it does not exist.
    async fn open(&self, cache: &str) -> Result<()>;
    /// Store `response` under `key`, creating the partition if needed.
    async fn put(&self, cache: &str, key: &str, response: FetchResponse) -> Result<()>;
    async fn match_in(&self, cache: &str, key: &str) -> Result<Option<FetchResponse>>;
    /// Search every partition, oldest first.
    async fn match_any(&self, key: &str) -> Result<Option<FetchResponse>>;
    /// Partition names in creation order.
    async fn keys(&self) -> Result<Vec<String>>;
    /// Returns whether the partition existed.
    async fn delete(&self, cache: &str) -> Result<bool>;
}

struct Partition {
    name: String,
    entries: HashMap<String, FetchResponse>,
}

/// In-process cache storage with an optional entry quota.
pub struct MemoryCacheStorage {
    partitions: RwLock<Vec<Partition>>,
    max_entries: Option<usize>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(Vec::new()),
            max_entries: None,
        }
    }

    /// Writes that would grow the total entry count past `max_entries` fail.
    pub fn with_quota(max_entries: usize) -> Self {
        Self {
            partitions: RwLock::new(Vec::new()),
            max_entries: Some(max_entries),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.partitions.read().iter().map(|p| p.entries.len()).sum()
    }
}

impl Default for MemoryCacheStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_partition<'a>(partitions: &'a mut Vec<Partition>, cache: &str) -> &'a mut Partition {
    let idx = match partitions.iter().position(|p| p.name == cache) {
        Some(idx) => idx,
        None => {
            partitions.push(Partition {
                name: cache.to_string(),
                entries: HashMap::new(),
            });
            partitions.len() - 1
        }
    };
    &mut partitions[idx]
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, cache: &str) -> Result<()> {
        let mut partitions = self.partitions.write();
        ensure_partition(&mut partitions, cache);
        Ok(())
    }

    async fn put(&self, cache: &str, key: &str, response: FetchResponse) -> Result<()> {
        let mut partitions = self.partitions.write();
        if let Some(max) = self.max_entries {
            let total: usize = partitions.iter().map(|p| p.entries.len()).sum();
            let replacing = partitions
                .iter()
                .any(|p| p.name == cache && p.entries.contains_key(key));
            if !replacing && total >= max {
                return Err(anyhow!("quota exceeded ({} entries)", max));
            }
        }
        ensure_partition(&mut partitions, cache)
            .entries
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn match_in(&self, cache: &str, key: &str) -> Result<Option<FetchResponse>> {
        let partitions = self.partitions.read();
        Ok(partitions
            .iter()
            .find(|p| p.name == cache)
            .and_then(|p| p.entries.get(key).cloned()))
    }

    async fn match_any(&self, key: &str) -> Result<Option<FetchResponse>> {
        let partitions = self.partitions.read();
        Ok(partitions.iter().find_map(|p| p.entries.get(key).cloned()))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .partitions
            .read()
            .iter()
            .map(|p| p.name.clone())
            .collect())
    }

    async fn delete(&self, cache: &str) -> Result<bool> {
        let mut partitions = self.partitions.write();
        let before = partitions.len();
        partitions.retain(|p| p.name != cache);
        Ok(partitions.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_match_delete() {
        let storage = MemoryCacheStorage::new();
        storage.open("a").await.unwrap();
        storage
            .put("b", "http://x/1", FetchResponse::ok("one"))
            .await
            .unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["a", "b"]);
        assert!(storage.match_in("a", "http://x/1").await.unwrap().is_none());
        let hit = storage.match_any("http://x/1").await.unwrap().unwrap();
        assert_eq!(hit.body, "one");

        assert!(storage.delete("b").await.unwrap());
        assert!(!storage.delete("b").await.unwrap());
        assert!(storage.match_any("http://x/1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quota_allows_overwrite() {
        let storage = MemoryCacheStorage::with_quota(1);
        storage.put("c", "k1", FetchResponse::ok("v1")).await.unwrap();
        storage.put("c", "k1", FetchResponse::ok("v2")).await.unwrap();
        assert!(storage.put("c", "k2", FetchResponse::ok("v3")).await.is_err());
        assert_eq!(storage.entry_count(), 1);
    }
}
