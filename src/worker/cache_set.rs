use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifies one deployed build's caches. Derived from install time, so a
/// later install yields a later tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn from_time(at: SystemTime) -> Self {
        let millis = at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self(format!("v-{}", millis))
    }

    pub fn now() -> Self {
        Self::from_time(SystemTime::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VersionTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three partitions belonging to one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSet {
    pub version: VersionTag,
    /// App-shell documents.
    pub shell: String,
    /// Long-lived assets matched by extension.
    pub static_assets: String,
    /// Everything else fetched while running.
    pub runtime: String,
}

impl CacheSet {
    pub fn resolve(prefix: &str, version: VersionTag) -> Self {
        Self {
            shell: format!("{}-shell-{}", prefix, version),
            static_assets: format!("{}-static-{}", prefix, version),
            runtime: format!("{}-runtime-{}", prefix, version),
            version,
        }
    }

    pub fn names(&self) -> [&str; 3] {
        [&self.shell, &self.static_assets, &self.runtime].map(String::as_str)
    }

    /// Exact membership; a substring test would let `v-1` claim `v-10`.
    pub fn owns(&self, cache_name: &str) -> bool {
        self.names().contains(&cache_name)
    }
}
