//! System-of-record loaders (§6): parameterized Postgres queries that back
//! C4's cache-through reader on a fast-store miss. Each loader returns a
//! value, a distinct not-found signal, or a surfaced `ErrorRecord` — never a
//! bare `sqlx::Error`.

use async_trait::async_trait;
use jobworker_shared::cache::{Loaded, Loader};
use jobworker_shared::error::{ErrorKind, ErrorRecord};
use sqlx::PgPool;

/// Loads a franchise's account status (`premium` / `verified` / `standard`)
/// by franchise id.
pub struct FranchiseAccountLoader {
    pub pool: PgPool,
}

#[async_trait]
impl Loader<String> for FranchiseAccountLoader {
    async fn load(&self, query: &str) -> Result<Loaded<String>, ErrorRecord> {
        let franchise_id = query.rsplit(':').next().unwrap_or(query);

        let row: Option<(String,)> = sqlx::query_as(
            "SELECT account_status FROM franchise_accounts WHERE franchise_id = $1",
        )
        .bind(franchise_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            ErrorRecord::new(ErrorKind::Unknown, "franchise account lookup failed")
                .with_detail(e.to_string())
        })?;

        Ok(match row {
            Some((status,)) => Loaded::Found(status),
            None => Loaded::NotFound,
        })
    }
}

/// Loads a user profile (stored as a JSON document) by user id, serialized
/// to a string so it fits C4's `ToString + FromStr` value bound.
pub struct UserProfileLoader {
    pub pool: PgPool,
}

#[async_trait]
impl Loader<String> for UserProfileLoader {
    async fn load(&self, query: &str) -> Result<Loaded<String>, ErrorRecord> {
        let user_id = query.rsplit(':').next().unwrap_or(query);

        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT profile FROM user_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    ErrorRecord::new(ErrorKind::Unknown, "user profile lookup failed")
                        .with_detail(e.to_string())
                })?;

        Ok(match row {
            Some((profile,)) => Loaded::Found(profile.to_string()),
            None => Loaded::NotFound,
        })
    }
}
