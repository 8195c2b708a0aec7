//! Persistence for the banned-host set.
//!
//! Stores only ever see host hashes, never host names.

use std::fmt::Debug;

use ahash::AHashSet;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sqlx::SqlitePool;

use crate::ban::host_hash;
use crate::error::Result;

/// Membership store for banned host hashes.
#[async_trait]
pub trait BanStore: Send + Sync + Debug {
    /// Number of records for the hash; a host is banned when this is non-zero.
    async fn count_hash(&self, hash: &str) -> Result<u64>;

    /// Add a hash. Adding a hash twice is not an error.
    async fn insert_hash(&self, hash: &str) -> Result<()>;

    /// Remove a hash if present.
    async fn remove_hash(&self, hash: &str) -> Result<()>;

    /// Ban a host by name, hashing it the same way lookups do.
    async fn ban_host(&self, host: &str) -> Result<()> {
        self.insert_hash(&host_hash(host)).await
    }
}

/// In-process ban store.
#[derive(Debug, Default)]
pub struct MemoryBanStore {
    hashes: RwLock<AHashSet<String>>,
}

impl MemoryBanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hashes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.read().is_empty()
    }
}

#[async_trait]
impl BanStore for MemoryBanStore {
    async fn count_hash(&self, hash: &str) -> Result<u64> {
        Ok(self.hashes.read().contains(hash) as u64)
    }

    async fn insert_hash(&self, hash: &str) -> Result<()> {
        self.hashes.write().insert(hash.to_string());
        Ok(())
    }

    async fn remove_hash(&self, hash: &str) -> Result<()> {
        self.hashes.write().remove(hash);
        Ok(())
    }
}

/// Ban store backed by the `banned_hosts` table.
#[derive(Debug, Clone)]
pub struct SqliteBanStore {
    pool: SqlitePool,
}

impl SqliteBanStore {
    /// Wrap a pool whose schema has been created with [`crate::db::migrate`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BanStore for SqliteBanStore {
    async fn count_hash(&self, hash: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM banned_hosts WHERE host_hash = ?")
            .bind(hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_hash(&self, hash: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO banned_hosts (host_hash, banned_at) VALUES (?, ?)")
            .bind(hash)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_hash(&self, hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM banned_hosts WHERE host_hash = ?")
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
