// Caching strategies. Each one degrades to the best cached copy instead of
// failing the fetch; cache write errors are logged and counted, never returned.

use std::sync::Arc;

use tracing::{debug, warn};

use super::request::{FetchRequest, FetchResponse};
use super::router::{CacheRouter, FetchOutcome};
use super::stats::StatsCollector;
use super::storage::CacheStorage;
use crate::error::WorkerError;

impl CacheRouter {
    /// Cross-origin and API traffic. Never cached.
    pub(crate) async fn network_only_with_fallback(&self, req: &FetchRequest) -> FetchOutcome {
        match self.network.fetch(req).await {
            Ok(resp) => {
                self.stats.record_network();
                FetchOutcome::Respond(resp)
            }
            Err(e) => {
                debug!("network-only {} failed: {}", req.url, e);
                self.shell_fallback().await
            }
        }
    }

    /// Navigations reflect the newest deployed markup. The shell copy is
    /// written in the background.
    pub(crate) async fn network_first_shell_fallback(&self, req: &FetchRequest) -> FetchOutcome {
        match self.network.fetch(req).await {
            Ok(resp) => {
                self.stats.record_network();
                self.store_detached(self.config.caches.shell.clone(), req.cache_key(), resp.clone());
                FetchOutcome::Respond(resp)
            }
            Err(e) => {
                debug!("navigation {} offline: {}", req.url, e);
                match self.lookup(&req.cache_key()).await {
                    Some(cached) => {
                        self.stats.record_cache_hit();
                        FetchOutcome::Respond(cached)
                    }
                    None => self.shell_fallback().await,
                }
            }
        }
    }

    /// Static assets: a cached copy is returned without touching the network.
    pub(crate) async fn cache_first(&self, req: &FetchRequest) -> FetchOutcome {
        let key = req.cache_key();
        if let Some(cached) = self.lookup(&key).await {
            self.stats.record_cache_hit();
            return FetchOutcome::Respond(cached);
        }

        match self.network.fetch(req).await {
            Ok(resp) => {
                self.stats.record_network();
                let cache = self.config.caches.static_assets.clone();
                store(&self.storage, &self.stats, &cache, &key, resp.clone()).await;
                FetchOutcome::Respond(resp)
            }
            Err(e) => {
                debug!("static {} unavailable: {}", req.url, e);
                self.shell_fallback().await
            }
        }
    }

    /// Dynamic resources: network first, runtime copy kept for offline use.
    pub(crate) async fn network_first_runtime_cache(&self, req: &FetchRequest) -> FetchOutcome {
        let key = req.cache_key();
        match self.network.fetch(req).await {
            Ok(resp) => {
                self.stats.record_network();
                let cache = self.config.caches.runtime.clone();
                store(&self.storage, &self.stats, &cache, &key, resp.clone()).await;
                FetchOutcome::Respond(resp)
            }
            Err(e) => {
                debug!("runtime {} offline: {}", req.url, e);
                match self.lookup(&key).await {
                    Some(cached) => {
                        self.stats.record_cache_hit();
                        FetchOutcome::Respond(cached)
                    }
                    None => {
                        self.stats.record_failed();
                        FetchOutcome::Failed
                    }
                }
            }
        }
    }

    async fn shell_fallback(&self) -> FetchOutcome {
        match self.lookup(&self.config.root_key()).await {
            Some(root) => {
                self.stats.record_shell_fallback();
                FetchOutcome::Respond(root)
            }
            None => {
                self.stats.record_failed();
                FetchOutcome::Failed
            }
        }
    }

    /// A failing cache read is treated as a miss.
    async fn lookup(&self, key: &str) -> Option<FetchResponse> {
        match self.storage.match_any(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("cache lookup {} failed: {}", key, e);
                None
            }
        }
    }

    fn store_detached(&self, cache: String, key: String, resp: FetchResponse) {
        let storage = Arc::clone(&self.storage);
        let stats = Arc::clone(&self.stats);
        self.writes.spawn(async move {
            store(&storage, &stats, &cache, &key, resp).await;
        });
    }
}

async fn store(
    storage: &Arc<dyn CacheStorage>,
    stats: &StatsCollector,
    cache: &str,
    key: &str,
    resp: FetchResponse,
) {
    if !resp.is_cacheable() {
        debug!("not caching {} (status {})", key, resp.status.as_u16());
        return;
    }
    if let Err(e) = storage.put(cache, key, resp).await {
        let err = WorkerError::CacheWrite {
            cache: cache.to_string(),
            reason: e.to_string(),
        };
        warn!("{}", err);
        stats.record_cache_write_failure();
    }
}
