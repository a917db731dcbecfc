// Fetch classification: decides which caching strategy answers a request.

use std::sync::Arc;

use reqwest::{Method, Url};
use tokio_util::task::TaskTracker;
use tracing::debug;

use super::cache_set::{CacheSet, VersionTag};
use super::network::Network;
use super::request::{cache_key, FetchRequest, FetchResponse, RequestMode};
use super::stats::StatsCollector;
use super::storage::CacheStorage;
use crate::config::WorkerConfig;
use crate::error::WorkerError;

/// Worker settings resolved once at initialization: URLs parsed against
/// the origin and cache names bound to this worker's version tag.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub origin: Url,
    pub caches: CacheSet,
    pub critical_urls: Vec<Url>,
    pub static_assets: Vec<Url>,
    pub static_extensions: Vec<String>,
    pub api_marker: String,
}

impl RouterConfig {
    pub fn resolve(config: &WorkerConfig, version: VersionTag) -> Result<Self, WorkerError> {
        let origin = Url::parse(&config.origin)
            .map_err(|_| WorkerError::InvalidOrigin(config.origin.clone()))?;
        if origin.cannot_be_a_base() {
            return Err(WorkerError::InvalidOrigin(config.origin.clone()));
        }

        let join = |paths: &[String]| -> Result<Vec<Url>, WorkerError> {
            paths
                .iter()
                .map(|p| {
                    origin
                        .join(p)
                        .map_err(|_| WorkerError::InvalidOrigin(format!("{}{}", config.origin, p)))
                })
                .collect()
        };

        Ok(Self {
            critical_urls: join(&config.critical_urls)?,
            static_assets: join(&config.static_assets)?,
            caches: CacheSet::resolve(&config.cache_prefix, version),
            static_extensions: config
                .static_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            api_marker: config.api_marker.clone(),
            origin,
        })
    }

    /// Cache key of the application root, the last-resort fallback.
    pub fn root_key(&self) -> String {
        cache_key(&self.origin.join("/").unwrap_or_else(|_| self.origin.clone()))
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    pub fn is_api_path(&self, path: &str) -> bool {
        !self.api_marker.is_empty() && path.contains(&self.api_marker)
    }

    pub fn is_static_asset(&self, path: &str) -> bool {
        let path = path.to_ascii_lowercase();
        self.static_extensions.iter().any(|ext| path.ends_with(ext))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; goes to the network untouched.
    Passthrough,
    /// Cross-origin or API: network, else the cached root document.
    NetworkOnly,
    /// Page load: network (shell updated in the background), else cache.
    Navigation,
    /// Static asset: cache, else network stored into the static partition.
    CacheFirst,
    /// Anything else: network stored into the runtime partition, else cache.
    Runtime,
}

pub fn classify(req: &FetchRequest, config: &RouterConfig) -> Route {
    if req.method != Method::GET {
        return Route::Passthrough;
    }
    if !config.is_same_origin(&req.url) || config.is_api_path(req.url.path()) {
        return Route::NetworkOnly;
    }
    if req.mode == RequestMode::Navigate {
        return Route::Navigation;
    }
    if config.is_static_asset(req.url.path()) {
        return Route::CacheFirst;
    }
    Route::Runtime
}

/// How an intercepted fetch was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Let the request go to the network as if nothing intercepted it.
    Passthrough,
    Respond(FetchResponse),
    /// Network failed and nothing usable was cached.
    Failed,
}

/// Strategy dispatch over a network and a cache storage.
pub struct CacheRouter {
    pub(crate) config: RouterConfig,
    pub(crate) network: Arc<dyn Network>,
    pub(crate) storage: Arc<dyn CacheStorage>,
    pub(crate) stats: Arc<StatsCollector>,
    /// Background cache writes the caller does not wait for.
    pub(crate) writes: TaskTracker,
}

impl CacheRouter {
    pub fn new(
        config: RouterConfig,
        network: Arc<dyn Network>,
        storage: Arc<dyn CacheStorage>,
    ) -> Self {
        Self {
            config,
            network,
            storage,
            stats: Arc::new(StatsCollector::new()),
            writes: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub async fn dispatch(&self, req: &FetchRequest) -> FetchOutcome {
        let route = classify(req, &self.config);
        debug!("fetch {} {} mode={:?} -> {:?}", req.method, req.url, req.mode, route);

        match route {
            Route::Passthrough => {
                self.stats.record_passthrough();
                FetchOutcome::Passthrough
            }
            Route::NetworkOnly => self.network_only_with_fallback(req).await,
            Route::Navigation => self.network_first_shell_fallback(req).await,
            Route::CacheFirst => self.cache_first(req).await,
            Route::Runtime => self.network_first_runtime_cache(req).await,
        }
    }

    /// Wait until every background cache write has finished.
    pub async fn settle(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}
