//! Auth logout task (§4.10): invalidates one or all of a user's sessions,
//! best-effort revokes the presented token, and records a 30-day audit
//! entry. Requires a configured fast store; absence is a hard failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jobworker_shared::error::{ErrorKind, ErrorRecord};
use jobworker_shared::logger::Field;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use jobworker_runtime::task::{Task, TaskContext};

use crate::session_store::SessionStore;

const REVOCATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const AUDIT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Deserialize)]
struct Input {
    #[serde(rename = "userId")]
    user_id: String,
    token: String,
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
    #[serde(rename = "allSessions", default)]
    all_sessions: bool,
}

#[derive(Debug, Serialize)]
struct Output {
    #[serde(rename = "sessionsInvalidated")]
    sessions_invalidated: u64,
    #[serde(rename = "tokenRevoked")]
    token_revoked: bool,
}

pub struct AuthLogoutTask {
    store: Option<Arc<dyn SessionStore>>,
}

impl AuthLogoutTask {
    pub fn new(store: Option<Arc<dyn SessionStore>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Task for AuthLogoutTask {
    fn task_type(&self) -> &'static str {
        "auth_logout"
    }

    async fn execute(&self, ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
        let input: Input = serde_json::from_value(input).map_err(|e| ErrorRecord::new(ErrorKind::ParseError, e.to_string()))?;

        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ErrorRecord::new(ErrorKind::RedisNotConfigured, "fast store is not configured"))?;

        let sessions_invalidated = if input.all_sessions {
            let pattern = format!("session:{}:*", input.user_id);
            store.del_by_pattern(&pattern).await.map_err(|e| {
                ErrorRecord::new(ErrorKind::SessionInvalidationError, e.to_string())
            })?
        } else {
            let session_id = input.session_id.as_deref().unwrap_or("default");
            let key = format!("session:{}:{}", input.user_id, session_id);
            store.del_by_pattern(&key).await.map_err(|e| {
                ErrorRecord::new(ErrorKind::SessionInvalidationError, e.to_string())
            })?
        };

        let revocation_key = format!("revoked_token:{}", input.token);
        let token_revoked = store.set(&revocation_key, "1", REVOCATION_TTL).await.is_ok();
        if !token_revoked {
            ctx.logger.warn("token revocation failed (best-effort)", &[]);
        }

        let audit_key = format!("audit:logout:{}:{}", input.user_id, Utc::now().to_rfc3339());
        if let Err(e) = store.set(&audit_key, &input.user_id, AUDIT_TTL).await {
            ctx.logger
                .warn("audit log write failed (best-effort)", &[Field::new("error", e.to_string())]);
        }

        serde_json::to_value(Output {
            sessions_invalidated,
            token_revoked,
        })
        .map_err(|e| ErrorRecord::new(ErrorKind::Unknown, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_store::test_support::InMemorySessionStore;
    use jobworker_shared::cache::FastStore;
    use jobworker_shared::logger::Logger;
    use serde_json::json;

    fn ctx() -> TaskContext {
        TaskContext::new(1, Duration::from_secs(5), Logger::noop())
    }

    #[tokio::test]
    async fn missing_store_is_redis_not_configured() {
        let task = AuthLogoutTask::new(None);
        let err = task
            .execute(&ctx(), json!({"userId": "u1", "token": "t1"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind.wire_code(""), "REDIS_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn single_session_invalidation_deletes_only_that_session() {
        let store = Arc::new(InMemorySessionStore::default());
        store.inner.set("session:u1:s1", "x", Duration::from_secs(60)).await.unwrap();
        store.inner.set("session:u1:s2", "x", Duration::from_secs(60)).await.unwrap();
        let task = AuthLogoutTask::new(Some(store.clone()));

        let out = task
            .execute(&ctx(), json!({"userId": "u1", "token": "t1", "sessionId": "s1"}))
            .await
            .unwrap();

        assert_eq!(out["sessionsInvalidated"], 1);
        assert!(store.inner.get("session:u1:s1").await.unwrap().is_none());
        assert!(store.inner.get("session:u1:s2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn all_sessions_flag_deletes_every_session_for_the_user() {
        let store = Arc::new(InMemorySessionStore::default());
        store.inner.set("session:u1:s1", "x", Duration::from_secs(60)).await.unwrap();
        store.inner.set("session:u1:s2", "x", Duration::from_secs(60)).await.unwrap();
        store.inner.set("session:u2:s1", "x", Duration::from_secs(60)).await.unwrap();
        let task = AuthLogoutTask::new(Some(store.clone()));

        let out = task
            .execute(&ctx(), json!({"userId": "u1", "token": "t1", "allSessions": true}))
            .await
            .unwrap();

        assert_eq!(out["sessionsInvalidated"], 2);
        assert!(store.inner.get("session:u2:s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn token_is_marked_revoked_on_success() {
        let store = Arc::new(InMemorySessionStore::default());
        let task = AuthLogoutTask::new(Some(store.clone()));

        let out = task
            .execute(&ctx(), json!({"userId": "u1", "token": "secret-token"}))
            .await
            .unwrap();

        assert_eq!(out["tokenRevoked"], true);
        assert!(store.inner.get("revoked_token:secret-token").await.unwrap().is_some());
    }
}
