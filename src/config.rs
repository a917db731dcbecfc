use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Backend used when neither the environment nor a config file names one.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Environment variable that overrides the backend base URL.
pub const BACKEND_URL_ENV: &str = "ADDREMARKS_BACKEND_URL";

/// Upper bound on a single upload request (2 minutes).
pub const UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Upper bound on a single status request.
pub const STATUS_TIMEOUT_SECS: u64 = 30;

/// Delay between two status polls.
pub const POLL_INTERVAL_MS: u64 = 2_000;

/// Number of status polls before processing is declared timed out.
pub const MAX_POLL_ATTEMPTS: u32 = 60;

/// Largest request body the offline proxy will buffer (64 MB).
pub const MAX_PROXY_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Top-level configuration for the upload client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the processing backend, without a trailing slash.
    pub backend_url: String,
    pub upload_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            status_timeout_secs: STATUS_TIMEOUT_SECS,
            poll_interval_ms: POLL_INTERVAL_MS,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
        }
    }
}

impl ClientConfig {
    /// Defaults, with the backend URL taken from `ADDREMARKS_BACKEND_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend_url = url.trim().to_string();
            }
        }
        config
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Static settings of the cache router. The version tag is not part of it:
/// that is resolved once when the worker is created.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin the worker controls, e.g. `http://localhost:3000`.
    pub origin: String,
    /// Prefix shared by every cache partition name.
    pub cache_prefix: String,
    /// App-shell documents that must be cached for installation to succeed.
    pub critical_urls: Vec<String>,
    /// Assets cached on a best-effort basis at install time.
    pub static_assets: Vec<String>,
    /// Path suffixes served cache-first.
    pub static_extensions: Vec<String>,
    /// Any path containing this marker is API traffic and never cached.
    pub api_marker: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            cache_prefix: "addremarks".to_string(),
            critical_urls: vec!["/".to_string(), "/manifest.json".to_string()],
            static_assets: vec![
                "/icons/icon-192x192.png".to_string(),
                "/icons/icon-512x512.png".to_string(),
            ],
            static_extensions: [
                ".js", ".css", ".woff", ".woff2", ".ttf", ".png", ".jpg", ".jpeg", ".gif",
                ".svg", ".webp",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            api_marker: "/api/".to_string(),
        }
    }
}

/// Everything the binary can read from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    /// Load from `path`; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read config {}: {}", path.display(), e))?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.backend_url, "http://localhost:5000");
        assert_eq!(config.upload_timeout(), Duration::from_secs(120));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.max_poll_attempts, 60);
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addremarks.toml");
        std::fs::write(
            &path,
            "[client]\nbackend_url = \"https://api.example.com\"\n\n[worker]\ncache_prefix = \"ar\"\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.client.backend_url, "https://api.example.com");
        assert_eq!(config.client.max_poll_attempts, MAX_POLL_ATTEMPTS);
        assert_eq!(config.worker.cache_prefix, "ar");
        assert_eq!(config.worker.critical_urls, vec!["/", "/manifest.json"]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(&dir.path().join("nope.toml")).is_err());
    }
}
