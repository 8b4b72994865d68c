//! Session store extension of the fast-store interface (§6): pattern
//! delete and liveness check, used only by auth-logout. Kept separate from
//! C4's [`jobworker_shared::cache::FastStore`] since the cache-through
//! reader never needs more than GET/SET.

use async_trait::async_trait;
use jobworker_shared::cache::FastStore;

#[async_trait]
pub trait SessionStore: FastStore {
    /// Delete every key matching `pattern`, returning the count removed.
    async fn del_by_pattern(&self, pattern: &str) -> Result<u64, anyhow::Error>;

    async fn ping(&self) -> Result<(), anyhow::Error>;
}
