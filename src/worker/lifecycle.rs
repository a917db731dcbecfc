// Service worker lifecycle: install precache, activation eviction, and the
// state gate in front of fetch interception.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::cache_set::{CacheSet, VersionTag};
use super::network::Network;
use super::request::{cache_key, FetchRequest, FetchResponse};
use super::router::{CacheRouter, FetchOutcome, RouterConfig};
use super::stats::RouterStats;
use super::storage::CacheStorage;
use crate::config::WorkerConfig;
use crate::error::WorkerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

pub struct ServiceWorker {
    router: CacheRouter,
    state: Mutex<WorkerState>,
}

impl ServiceWorker {
    /// Create a worker whose version tag is the current time.
    pub fn new(
        config: &WorkerConfig,
        network: Arc<dyn Network>,
        storage: Arc<dyn CacheStorage>,
    ) -> Result<Self, WorkerError> {
        Self::with_version(config, VersionTag::now(), network, storage)
    }

    pub fn with_version(
        config: &WorkerConfig,
        version: VersionTag,
        network: Arc<dyn Network>,
        storage: Arc<dyn CacheStorage>,
    ) -> Result<Self, WorkerError> {
        let resolved = RouterConfig::resolve(config, version)?;
        info!(
            "service worker {} created for {}",
            resolved.caches.version, resolved.origin
        );
        Ok(Self {
            router: CacheRouter::new(resolved, network, storage),
            state: Mutex::new(WorkerState::Installing),
        })
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn caches(&self) -> &CacheSet {
        &self.router.config.caches
    }

    pub fn origin(&self) -> &reqwest::Url {
        &self.router.config.origin
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.router.network
    }

    pub fn stats(&self) -> RouterStats {
        self.router.stats.snapshot()
    }

    /// Precache the shell (all or nothing) and the static assets (each on
    /// its own, failures ignored). A shell failure makes the worker redundant.
    pub async fn install(&self) -> Result<(), WorkerError> {
        {
            let state = self.state.lock();
            if *state != WorkerState::Installing {
                debug!("install skipped in state {:?}", *state);
                return Ok(());
            }
        }

        let (shell, ()) = tokio::join!(self.precache_shell(), self.precache_static());

        let mut state = self.state.lock();
        match shell {
            Ok(()) => {
                *state = WorkerState::Installed;
                info!("service worker {} installed", self.caches().version);
                Ok(())
            }
            Err(e) => {
                *state = WorkerState::Redundant;
                warn!("service worker install failed: {}", e);
                Err(e)
            }
        }
    }

    /// Delete every partition not owned by this version, then start
    /// intercepting. Returns the deleted partition names.
    pub async fn activate(&self) -> Vec<String> {
        {
            let mut state = self.state.lock();
            if *state != WorkerState::Installed {
                warn!("activate ignored in state {:?}", *state);
                return Vec::new();
            }
            *state = WorkerState::Activating;
        }

        let mut deleted = Vec::new();
        match self.router.storage.keys().await {
            Ok(names) => {
                for name in names.into_iter().filter(|n| !self.caches().owns(n)) {
                    match self.router.storage.delete(&name).await {
                        Ok(_) => {
                            debug!("evicted stale cache {}", name);
                            deleted.push(name);
                        }
                        Err(e) => warn!("failed to delete cache {}: {}", name, e),
                    }
                }
            }
            Err(e) => warn!("cannot enumerate caches, eviction skipped: {}", e),
        }

        *self.state.lock() = WorkerState::Active;
        info!(
            "service worker {} active, evicted {} stale caches",
            self.caches().version,
            deleted.len()
        );
        deleted
    }

    /// Install and activate right away instead of waiting for existing
    /// clients to go away.
    pub async fn register(&self) -> Result<(), WorkerError> {
        self.install().await?;
        self.activate().await;
        Ok(())
    }

    /// Answer an intercepted fetch. Only an active worker intercepts.
    pub async fn handle_fetch(&self, req: &FetchRequest) -> FetchOutcome {
        if self.state() != WorkerState::Active {
            self.router.stats.record_passthrough();
            return FetchOutcome::Passthrough;
        }
        self.router.dispatch(req).await
    }

    /// Wait for background cache writes.
    pub async fn settle(&self) {
        self.router.settle().await;
    }

    /// Superseded or shut down; stops intercepting.
    pub fn retire(&self) {
        *self.state.lock() = WorkerState::Redundant;
        info!("service worker {} redundant", self.caches().version);
    }

    async fn precache_shell(&self) -> Result<(), WorkerError> {
        let config = &self.router.config;
        let mut fetched: Vec<(String, FetchResponse)> = Vec::with_capacity(config.critical_urls.len());

        for url in &config.critical_urls {
            let req = FetchRequest::get(url.clone());
            let resp = self
                .router
                .network
                .fetch(&req)
                .await
                .map_err(|e| WorkerError::Precache {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            if !resp.is_cacheable() {
                return Err(WorkerError::Precache {
                    url: url.to_string(),
                    reason: format!("HTTP {}", resp.status.as_u16()),
                });
            }
            fetched.push((cache_key(url), resp));
        }

        let shell = &config.caches.shell;
        self.router
            .storage
            .open(shell)
            .await
            .map_err(|e| WorkerError::Precache {
                url: shell.clone(),
                reason: e.to_string(),
            })?;
        for (key, resp) in fetched {
            self.router
                .storage
                .put(shell, &key, resp)
                .await
                .map_err(|e| WorkerError::Precache {
                    url: key.clone(),
                    reason: e.to_string(),
                })?;
        }
        debug!("precached {} shell urls", config.critical_urls.len());
        Ok(())
    }

    async fn precache_static(&self) {
        let config = &self.router.config;
        let cache = &config.caches.static_assets;
        if let Err(e) = self.router.storage.open(cache).await {
            warn!("cannot open {}: {}", cache, e);
            return;
        }

        for url in &config.static_assets {
            let req = FetchRequest::get(url.clone());
            match self.router.network.fetch(&req).await {
                Ok(resp) if resp.is_cacheable() => {
                    if let Err(e) = self.router.storage.put(cache, &cache_key(url), resp).await {
                        warn!("static precache {} not stored: {}", url, e);
                    }
                }
                Ok(resp) => debug!("static precache {} skipped: HTTP {}", url, resp.status.as_u16()),
                Err(e) => debug!("static precache {} failed: {}", url, e),
            }
        }
    }
}
