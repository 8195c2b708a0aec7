//! Configuration for the index, the ban gate and the datastore.
//!
//! All sections deserialize from TOML and fall back to defaults for any key
//! that is missing, so a configuration file only needs to name what differs.
//!
//! ```
//! use onion_index::config::Config;
//!
//! let config = Config::from_toml_str(
//!     r#"
//!     [index]
//!     index_dir = "/var/lib/onion/index"
//!     lock_timeout_ms = 250
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.index.lock_timeout_ms, 250);
//! assert_eq!(config.index.default_limit, 10);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OnionIndexError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search index settings.
    pub index: IndexConfig,
    /// Ban gate settings.
    pub ban: BanConfig,
    /// Relational datastore settings.
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OnionIndexError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// BM25 ranking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    /// Term frequency saturation.
    pub k1: f32,
    /// Field length normalization.
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Bm25Config { k1: 1.2, b: 0.75 }
    }
}

/// Configuration for the on-disk search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the index. Created if absent.
    pub index_dir: PathBuf,

    /// How long `init` keeps retrying the directory lock. Zero means a single attempt.
    pub lock_timeout_ms: u64,

    /// Delay between lock attempts.
    pub lock_poll_interval_ms: u64,

    /// Whether operations on a manager that is not open open it transparently.
    pub lazy_init: bool,

    /// Segment count above which a commit merges all segments into one.
    pub merge_factor: usize,

    /// Number of hits returned by `search` when no limit is given.
    pub default_limit: usize,

    /// Ranking parameters.
    pub bm25: Bm25Config,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            index_dir: PathBuf::from("work/index"),
            lock_timeout_ms: 1000,
            lock_poll_interval_ms: 25,
            lazy_init: true,
            merge_factor: 10,
            default_limit: 10,
            bm25: Bm25Config::default(),
        }
    }
}

impl IndexConfig {
    /// Create a configuration for the given index directory with default settings.
    pub fn new<P: Into<PathBuf>>(index_dir: P) -> Self {
        IndexConfig {
            index_dir: index_dir.into(),
            ..Default::default()
        }
    }

    /// Set the lock acquisition timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable or disable lazy initialization.
    pub fn with_lazy_init(mut self, lazy_init: bool) -> Self {
        self.lazy_init = lazy_init;
        self
    }

    /// Set the merge factor.
    pub fn with_merge_factor(mut self, merge_factor: usize) -> Self {
        self.merge_factor = merge_factor;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms.max(1))
    }
}

/// Configuration for the ban gate's membership cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BanConfig {
    /// Lifetime of a cached membership answer.
    pub cache_ttl_secs: u64,
    /// Maximum number of cached hosts. Zero disables caching.
    pub cache_capacity: u64,
}

impl Default for BanConfig {
    fn default() -> Self {
        BanConfig {
            cache_ttl_secs: 300,
            cache_capacity: 10_000,
        }
    }
}

/// Configuration for the SQLite datastore backing the ban list and host status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLx connection URL.
    pub url: String,
    /// Pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: "sqlite://work/onion.db?mode=rwc".to_string(),
            max_connections: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.index.lock_timeout_ms, 1000);
        assert!(config.index.lazy_init);
        assert_eq!(config.index.merge_factor, 10);
        assert_eq!(config.index.bm25, Bm25Config { k1: 1.2, b: 0.75 });
        assert_eq!(config.ban.cache_capacity, 10_000);
        assert_eq!(config.database.max_connections, 4);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [index]
            lazy_init = false

            [index.bm25]
            k1 = 2.0

            [ban]
            cache_capacity = 0
            "#,
        )
        .unwrap();

        assert!(!config.index.lazy_init);
        assert_eq!(config.index.bm25.k1, 2.0);
        assert_eq!(config.index.bm25.b, 0.75);
        assert_eq!(config.ban.cache_capacity, 0);
        assert_eq!(config.ban.cache_ttl_secs, 300);
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml_str("[index\nlazy_init = ");
        assert!(matches!(result, Err(OnionIndexError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/onion-index.toml");
        assert!(matches!(result, Err(OnionIndexError::Config(_))));
    }
}
