//! Redis-backed [`FastStore`] (§6): the production fast-store connection
//! used by priority routing, match scoring, and auth logout. Connection
//! pooling and thread-safety are `redis::aio::ConnectionManager`'s own
//! precondition (§5).

use std::time::Duration;

use async_trait::async_trait;
use jobworker_shared::cache::FastStore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::session_store::SessionStore;

pub struct RedisFastStore {
    conn: ConnectionManager,
}

impl RedisFastStore {
    pub async fn connect(redis_url: &str) -> Result<Self, anyhow::Error> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Delete every key matching `pattern` (used by auth-logout's
    /// all-sessions invalidation). Best-effort: errors are returned to the
    /// caller, who may choose to treat them as non-fatal per §4.10.
    pub async fn delete_matching(&self, pattern: &str) -> Result<u64, anyhow::Error> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let deleted: u64 = conn.del(&keys).await?;
        Ok(deleted)
    }

    pub async fn ping(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), anyhow::Error> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisFastStore {
    async fn del_by_pattern(&self, pattern: &str) -> Result<u64, anyhow::Error> {
        self.delete_matching(pattern).await
    }

    async fn ping(&self) -> Result<(), anyhow::Error> {
        RedisFastStore::ping(self).await
    }
}
