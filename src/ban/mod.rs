//! The ban gate: decides whether a URL's host may be crawled.
//!
//! A host is banned when the SHA-256 of its lower-cased name is present in a
//! [`BanStore`]. Answers may be cached for a bounded time; banning or
//! unbanning through the gate invalidates the cached answer for that host.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use crate::config::BanConfig;
use crate::error::{OnionIndexError, Result};

pub use store::{BanStore, MemoryBanStore, SqliteBanStore};

/// Stable one-way hash of a host name: lower-case hex SHA-256 of the
/// lower-cased host.
///
/// ```
/// use onion_index::ban::host_hash;
///
/// assert_eq!(host_hash("Example.onion"), host_hash("example.onion"));
/// assert_eq!(host_hash("example.onion").len(), 64);
/// ```
pub fn host_hash(host: &str) -> String {
    hex::encode(Sha256::digest(host.to_lowercase().as_bytes()))
}

/// The lower-cased host of a URL.
pub fn host_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| OnionIndexError::malformed_url(format!("{url:?}: {e}")))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_lowercase()),
        _ => Err(OnionIndexError::malformed_url(format!("{url:?} has no host"))),
    }
}

/// Checks URLs against the banned-host set.
#[derive(Debug, Clone)]
pub struct BanGate {
    store: Arc<dyn BanStore>,
    cache: Option<Cache<String, bool>>,
}

impl BanGate {
    /// A gate that caches answers as configured. A zero capacity disables the cache.
    pub fn new(store: Arc<dyn BanStore>, config: &BanConfig) -> Self {
        let cache = (config.cache_capacity > 0).then(|| {
            Cache::builder()
                .max_capacity(config.cache_capacity)
                .time_to_live(Duration::from_secs(config.cache_ttl_secs))
                .build()
        });
        BanGate { store, cache }
    }

    /// A gate that asks the store on every call.
    pub fn uncached(store: Arc<dyn BanStore>) -> Self {
        BanGate { store, cache: None }
    }

    pub fn store(&self) -> &Arc<dyn BanStore> {
        &self.store
    }

    /// Whether the URL's host is banned.
    ///
    /// Fails with `MalformedUrl` if the URL cannot be parsed or has no host,
    /// and with `StorageIo` if the store cannot be queried.
    pub async fn is_banned(&self, url: &str) -> Result<bool> {
        let host = host_of(url)?;
        let hash = host_hash(&host);

        if let Some(banned) = self.cache.as_ref().and_then(|cache| cache.get(&hash)) {
            return Ok(banned);
        }

        let banned = self.store.count_hash(&hash).await.map_err(|e| e.during("is_banned"))? > 0;
        if let Some(cache) = &self.cache {
            cache.insert(hash, banned);
        }
        debug!(%host, banned, "checked ban list");
        Ok(banned)
    }

    /// Ban the URL's host.
    pub async fn ban(&self, url: &str) -> Result<()> {
        let host = host_of(url)?;
        let hash = host_hash(&host);
        self.store.insert_hash(&hash).await.map_err(|e| e.during("ban"))?;
        self.invalidate(&hash);
        info!(%host, "banned host");
        Ok(())
    }

    /// Lift a ban on the URL's host.
    pub async fn unban(&self, url: &str) -> Result<()> {
        let host = host_of(url)?;
        let hash = host_hash(&host);
        self.store.remove_hash(&hash).await.map_err(|e| e.during("unban"))?;
        self.invalidate(&hash);
        info!(%host, "unbanned host");
        Ok(())
    }

    fn invalidate(&self, hash: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("http://Example.Onion/page?q=1").unwrap(), "example.onion");
        assert_eq!(host_of("  https://a.onion:8080/  ").unwrap(), "a.onion");

        for bad in ["not a url", "", "example.onion", "mailto:someone@example.onion"] {
            assert!(
                matches!(host_of(bad), Err(OnionIndexError::MalformedUrl(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            host_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_cache_invalidated_by_ban() {
        let store = Arc::new(MemoryBanStore::new());
        let gate = BanGate::new(store.clone(), &BanConfig::default());

        tokio_test::block_on(async {
            assert!(!gate.is_banned("http://example.onion/").await.unwrap());
            gate.ban("http://example.onion/other").await.unwrap();
            assert!(gate.is_banned("http://example.onion/").await.unwrap());
            gate.unban("http://EXAMPLE.onion").await.unwrap();
            assert!(!gate.is_banned("http://example.onion/").await.unwrap());
        });
    }

    #[test]
    fn test_cache_serves_stale_answer_until_ttl() {
        let store = Arc::new(MemoryBanStore::new());
        let gate = BanGate::new(store.clone(), &BanConfig::default());
        let uncached = BanGate::uncached(store.clone());

        tokio_test::block_on(async {
            assert!(!gate.is_banned("http://example.onion/").await.unwrap());
            store.ban_host("example.onion").await.unwrap();

            assert!(!gate.is_banned("http://example.onion/").await.unwrap());
            assert!(uncached.is_banned("http://example.onion/").await.unwrap());
        });
    }
}
