//! Online/offline status of crawled hosts.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::Result;

/// Last known status of a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    pub host: String,
    pub online: bool,
    pub updated_at: DateTime<Utc>,
}

/// Records host status for the crawler.
#[async_trait]
pub trait HostStatusStore: Send + Sync + Debug {
    /// Insert or update the status of `host`.
    async fn set_status(&self, host: &str, online: bool) -> Result<()>;

    /// Number of distinct known hosts.
    async fn count(&self) -> Result<u64>;

    async fn status(&self, host: &str) -> Result<Option<HostStatus>>;
}

/// In-process host status store.
#[derive(Debug, Default)]
pub struct MemoryHostStatusStore {
    hosts: RwLock<HashMap<String, HostStatus>>,
}

impl MemoryHostStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HostStatusStore for MemoryHostStatusStore {
    async fn set_status(&self, host: &str, online: bool) -> Result<()> {
        let status = HostStatus {
            host: host.to_string(),
            online,
            updated_at: Utc::now(),
        };
        self.hosts.write().insert(host.to_string(), status);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.hosts.read().len() as u64)
    }

    async fn status(&self, host: &str) -> Result<Option<HostStatus>> {
        Ok(self.hosts.read().get(host).cloned())
    }
}

/// Host status store backed by the `onion_hosts` table.
#[derive(Debug, Clone)]
pub struct SqliteHostStatusStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct HostRow {
    host: String,
    online: bool,
    updated_at: DateTime<Utc>,
}

impl SqliteHostStatusStore {
    /// Wrap a pool whose schema has been created with [`crate::db::migrate`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HostStatusStore for SqliteHostStatusStore {
    async fn set_status(&self, host: &str, online: bool) -> Result<()> {
        sqlx::query(
            "INSERT INTO onion_hosts (host, online, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(host) DO UPDATE \
             SET online = excluded.online, updated_at = excluded.updated_at",
        )
        .bind(host)
        .bind(online)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM onion_hosts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn status(&self, host: &str) -> Result<Option<HostStatus>> {
        let row: Option<HostRow> = sqlx::query_as(
            "SELECT host, online, updated_at FROM onion_hosts WHERE host = ?",
        )
        .bind(host)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| HostStatus {
            host: row.host,
            online: row.online,
            updated_at: row.updated_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn exercise(store: &dyn HostStatusStore) {
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.status("a.onion").await.unwrap().is_none());

        store.set_status("a.onion", true).await.unwrap();
        store.set_status("b.onion", false).await.unwrap();
        store.set_status("a.onion", false).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let status = store.status("a.onion").await.unwrap().unwrap();
        assert_eq!(status.host, "a.onion");
        assert!(!status.online);
    }

    #[test]
    fn test_memory_store() {
        tokio_test::block_on(exercise(&MemoryHostStatusStore::new()));
    }

    #[test]
    fn test_sqlite_store() {
        tokio_test::block_on(async {
            let store = SqliteHostStatusStore::new(db::connect_in_memory().await.unwrap());
            exercise(&store).await;
        });
    }
}
