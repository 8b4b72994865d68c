//! # Template registry (C8)
//!
//! TTL-cached [`TemplateDefinition`]s loaded from a registry document (§3,
//! §4.8, §6). Reads take a reader lock first; on a cache miss or expiry they
//! acquire a writer lock, reparse the document, and install a fresh entry.
//! Concurrent callers may race to rebuild — last writer wins, no invariant
//! is broken by the race (§4.8, §9).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{ErrorKind, ErrorRecord};

/// A registry entry (§3). `id` is unique within a registry document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub template_type: String,
    #[serde(default)]
    pub schema: Value,
    pub template: Value,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    templates: Vec<TemplateDefinition>,
}

/// An in-process cache record: the value, a load time, and a TTL (§3).
/// `age = now - loadTime < TTL ⇒ entry is authoritative`.
#[derive(Clone)]
struct CacheEntry {
    value: Arc<TemplateDefinition>,
    loaded_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() < ttl
    }
}

/// Reads a registry document from disk. Split out as a trait so tests can
/// substitute an in-memory document without touching the filesystem.
pub trait RegistrySource: Send + Sync {
    fn read(&self) -> Result<String, ErrorRecord>;
}

pub struct FileRegistrySource {
    pub path: PathBuf,
}

impl RegistrySource for FileRegistrySource {
    fn read(&self) -> Result<String, ErrorRecord> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            ErrorRecord::new(ErrorKind::Unknown, "failed to read registry document")
                .with_detail(e.to_string())
        })
    }
}

/// TTL-cached reader over a [`RegistryDocument`] (§4.8).
pub struct TemplateRegistry {
    source: Box<dyn RegistrySource>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl TemplateRegistry {
    pub fn new(source: impl RegistrySource + 'static, ttl: Duration) -> Self {
        Self {
            source: Box::new(source),
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>, ttl: Duration) -> Self {
        Self::new(
            FileRegistrySource {
                path: path.as_ref().to_path_buf(),
            },
            ttl,
        )
    }

    /// Resolve `id`. TTL=0 means "rebuild every call" (§4.8).
    pub async fn get(&self, id: &str) -> Result<Arc<TemplateDefinition>, ErrorRecord> {
        if self.ttl > Duration::ZERO {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(id) {
                if entry.is_fresh(self.ttl) {
                    return Ok(entry.value.clone());
                }
            }
        }

        self.rebuild(id).await
    }

    async fn rebuild(&self, id: &str) -> Result<Arc<TemplateDefinition>, ErrorRecord> {
        let raw = self.source.read()?;
        let doc: RegistryDocument = serde_json::from_str(&raw).map_err(|e| {
            ErrorRecord::new(ErrorKind::Unknown, "malformed registry document")
                .with_detail(e.to_string())
        })?;

        let found = doc.templates.into_iter().find(|t| t.id == id);
        let definition = match found {
            Some(def) => Arc::new(def),
            None => {
                return Err(ErrorRecord::new(
                    ErrorKind::TemplateNotFound,
                    format!("no template with id '{id}'"),
                ))
            }
        };

        let mut cache = self.cache.write().await;
        let entry = CacheEntry {
            value: definition.clone(),
            loaded_at: Instant::now(),
        };
        cache.insert(id.to_string(), entry);

        Ok(definition)
    }
}
