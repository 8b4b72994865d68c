//! # Cache-through reader (C4)
//!
//! Generic read-through against a fast store with a system-of-record
//! fallback loader, TTL write-back, and soft-fail semantics (§4.4). Cache
//! faults are recoverable; system-of-record faults are surfaced.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ErrorRecord;
use crate::logger::Logger;

/// Fast store GET/SET pair, keyed by string with per-call TTL (§6).
#[async_trait]
pub trait FastStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), anyhow::Error>;
}

/// System-of-record loader's outcome.
pub enum Loaded<V> {
    Found(V),
    NotFound,
}

/// Load from the system of record, returning a value, a distinct not-found
/// signal, or a surfaced error.
#[async_trait]
pub trait Loader<V>: Send + Sync {
    async fn load(&self, query: &str) -> Result<Loaded<V>, ErrorRecord>;
}

/// Outcome of a cache-through read: distinguishes "loader said not found"
/// from an ordinary found value so tasks can apply their own not-found
/// policy (§9's priority-routing vs. match-score contrast).
pub enum CacheRead<V> {
    Found(V),
    NotFound,
}

/// Cache-through reader parameterized by a key builder, a fast store, a
/// system-of-record loader, and an optional value normalizer.
pub struct CacheThroughReader<'a, V> {
    fast_store: &'a dyn FastStore,
    loader: &'a dyn Loader<V>,
    ttl: Duration,
    logger: &'a Logger,
}

impl<'a, V> CacheThroughReader<'a, V>
where
    V: ToString + std::str::FromStr + Clone + Send + Sync,
{
    pub fn new(
        fast_store: &'a dyn FastStore,
        loader: &'a dyn Loader<V>,
        ttl: Duration,
        logger: &'a Logger,
    ) -> Self {
        Self {
            fast_store,
            loader,
            ttl,
            logger,
        }
    }

    /// Run the cache-through read protocol (§4.4):
    /// 1. GET from the fast store; a hit (or any GET error treated as miss)
    ///    returns without consulting the loader.
    /// 2. On miss, call the loader.
    /// 3. `NotFound` surfaces distinctly; it is never backfilled.
    /// 4. Otherwise, normalize (if a normalizer is given) and write-behind
    ///    SET to the fast store; a SET failure is logged at warn and does
    ///    not fail the read.
    pub async fn read(
        &self,
        key: &str,
        normalize: Option<&dyn Fn(V) -> V>,
    ) -> Result<CacheRead<V>, ErrorRecord> {
        match self.fast_store.get(key).await {
            Ok(Some(raw)) => {
                if let Ok(value) = raw.parse::<V>() {
                    return Ok(CacheRead::Found(value));
                }
                self.logger.warn(
                    "fast store hit failed to parse, falling back to loader",
                    &[],
                );
            }
            Ok(None) => {}
            Err(e) => {
                self.logger
                    .warn("fast store GET failed, falling back to loader", &[crate::logger::Field::new("error", e.to_string())]);
            }
        }

        match self.loader.load(key).await? {
            Loaded::NotFound => Ok(CacheRead::NotFound),
            Loaded::Found(value) => {
                let value = match normalize {
                    Some(f) => f(value),
                    None => value,
                };

                let serialized = value.to_string();
                if let Err(e) = self.fast_store.set(key, &serialized, self.ttl).await {
                    self.logger.warn(
                        "fast store SET failed, read still succeeds",
                        &[crate::logger::Field::new("error", e.to_string())],
                    );
                }

                Ok(CacheRead::Found(value))
            }
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-process fake fast store for tests (no live Redis needed for unit
    /// tests).
    #[derive(Default)]
    pub struct InMemoryFastStore {
        pub data: Mutex<HashMap<String, String>>,
        pub fail_get: bool,
        pub fail_set: bool,
    }

    #[async_trait]
    impl FastStore for InMemoryFastStore {
        async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
            if self.fail_get {
                return Err(anyhow::anyhow!("simulated GET failure"));
            }
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), anyhow::Error> {
            if self.fail_set {
                return Err(anyhow::anyhow!("simulated SET failure"));
            }
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    pub struct StaticLoader<V> {
        pub result: Mutex<Option<Result<Loaded<V>, ErrorRecord>>>,
        pub calls: Mutex<u32>,
    }

    impl<V> StaticLoader<V> {
        pub fn found(value: V) -> Self {
            Self {
                result: Mutex::new(Some(Ok(Loaded::Found(value)))),
                calls: Mutex::new(0),
            }
        }

        pub fn not_found() -> Self {
            Self {
                result: Mutex::new(Some(Ok(Loaded::NotFound))),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl<V: Send + Sync + Clone> Loader<V> for StaticLoader<V> {
        async fn load(&self, _query: &str) -> Result<Loaded<V>, ErrorRecord> {
            *self.calls.lock().unwrap() += 1;
            let mut guard = self.result.lock().unwrap();
            match guard.take() {
                Some(Ok(Loaded::Found(v))) => {
                    *guard = Some(Ok(Loaded::Found(v.clone())));
                    Ok(Loaded::Found(v))
                }
                Some(Ok(Loaded::NotFound)) => {
                    *guard = Some(Ok(Loaded::NotFound));
                    Ok(Loaded::NotFound)
                }
                Some(Err(e)) => Err(e),
                None => Err(ErrorRecord::new(crate::error::ErrorKind::Unknown, "exhausted")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn priming_fast_store_returns_value_without_invoking_loader() {
        let store = InMemoryFastStore::default();
        store
            .data
            .lock()
            .unwrap()
            .insert("k".to_string(), "premium".to_string());
        let loader = StaticLoader::<String>::found("should-not-be-used".to_string());
        let logger = Logger::noop();
        let reader = CacheThroughReader::new(&store, &loader, Duration::from_secs(60), &logger);

        let result = reader.read("k", None).await.unwrap();
        assert!(matches!(result, CacheRead::Found(v) if v == "premium"));
        assert_eq!(*loader.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn fast_store_get_failure_falls_back_to_loader_without_failing_read() {
        let store = InMemoryFastStore {
            fail_get: true,
            ..Default::default()
        };
        let loader = StaticLoader::<String>::found("standard".to_string());
        let logger = Logger::noop();
        let reader = CacheThroughReader::new(&store, &loader, Duration::from_secs(60), &logger);

        let result = reader.read("k", None).await.unwrap();
        assert!(matches!(result, CacheRead::Found(v) if v == "standard"));
    }

    #[tokio::test]
    async fn loader_not_found_is_not_backfilled() {
        let store = InMemoryFastStore::default();
        let loader = StaticLoader::<String>::not_found();
        let logger = Logger::noop();
        let reader = CacheThroughReader::new(&store, &loader, Duration::from_secs(60), &logger);

        let result = reader.read("missing", None).await.unwrap();
        assert!(matches!(result, CacheRead::NotFound));
        assert!(store.data.lock().unwrap().get("missing").is_none());
    }

    #[tokio::test]
    async fn set_failure_does_not_fail_the_read() {
        let store = InMemoryFastStore {
            fail_set: true,
            ..Default::default()
        };
        let loader = StaticLoader::<String>::found("verified".to_string());
        let logger = Logger::noop();
        let reader = CacheThroughReader::new(&store, &loader, Duration::from_secs(60), &logger);

        let result = reader.read("k", None).await.unwrap();
        assert!(matches!(result, CacheRead::Found(v) if v == "verified"));
    }

    #[tokio::test]
    async fn normalizer_is_applied_before_backfill() {
        let store = InMemoryFastStore::default();
        let loader = StaticLoader::<String>::found("weird-value".to_string());
        let logger = Logger::noop();
        let reader = CacheThroughReader::new(&store, &loader, Duration::from_secs(60), &logger);

        let normalize = |v: String| if v == "weird-value" { "standard".to_string() } else { v };
        let result = reader.read("k", Some(&normalize)).await.unwrap();
        assert!(matches!(result, CacheRead::Found(v) if v == "standard"));
        assert_eq!(
            store.data.lock().unwrap().get("k").cloned(),
            Some("standard".to_string())
        );
    }

    #[tokio::test]
    async fn loader_error_surfaces() {
        let store = InMemoryFastStore::default();
        let loader = StaticLoader::<String> {
            result: std::sync::Mutex::new(Some(Err(ErrorRecord::new(
                ErrorKind::Unknown,
                "db down",
            )))),
            calls: std::sync::Mutex::new(0),
        };
        let logger = Logger::noop();
        let reader = CacheThroughReader::new(&store, &loader, Duration::from_secs(60), &logger);

        let result = reader.read("k", None).await;
        assert!(result.is_err());
    }
}
