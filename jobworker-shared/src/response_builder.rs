//! # Response builder (C9)
//!
//! Resolves a `templateId` to a cached [`TemplateDefinition`] (C8), validates
//! input against its schema (C3), recursively substitutes placeholders, and
//! produces a canonical [`ResponseEnvelope`] (§4.9).

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ErrorKind, ErrorRecord};
use crate::schema;
use crate::template_registry::TemplateRegistry;

/// The canonical reply shape (§3).
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub status: &'static str,
    pub data: Value,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub timestamp: String,
    pub version: String,
}

pub struct ResponseBuilder<'a> {
    registry: &'a TemplateRegistry,
    app_version: String,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(registry: &'a TemplateRegistry, app_version: impl Into<String>) -> Self {
        Self {
            registry,
            app_version: app_version.into(),
        }
    }

    /// Build the envelope for `template_id` given `request_id` and a
    /// key-value `data` payload (§4.9 steps 1-5).
    pub async fn build(
        &self,
        template_id: &str,
        request_id: &str,
        data: &Value,
    ) -> Result<ResponseEnvelope, ErrorRecord> {
        let template = self.registry.get(template_id).await?;

        if let Err(violations) = schema::validate(&template.schema, data) {
            return Err(ErrorRecord::new(
                ErrorKind::TemplateValidationFailed,
                violations.join("; "),
            ));
        }

        let substituted = substitute(&template.template, data);

        if !substituted.is_object() {
            return Err(ErrorRecord::new(
                ErrorKind::ResponseRootNotObject,
                "substituted template root is not an object",
            ));
        }

        Ok(ResponseEnvelope {
            request_id: request_id.to_string(),
            status: "success",
            data: substituted,
            metadata: ResponseMetadata {
                timestamp: Utc::now().to_rfc3339(),
                version: self.app_version.clone(),
            },
        })
    }
}

/// Recursively substitute placeholders in `template` using `data` (§4.9
/// step 3). Structure-preserving: same keys at every map, same length at
/// every list, terminates on any finite tree.
pub fn substitute(template: &Value, data: &Value) -> Value {
    match template {
        Value::String(s) => {
            let trimmed = s.trim();
            if let Some(path) = placeholder_path(trimmed) {
                resolve_path(data, &path)
            } else {
                Value::String(s.clone())
            }
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), substitute(value, data));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, data)).collect()),
        other => other.clone(),
    }
}

/// Extract the dotted key path from a `{{dotted.key.path}}` leaf, requiring
/// an exact match (after trimming whitespace).
fn placeholder_path(trimmed: &str) -> Option<Vec<String>> {
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    let inner = inner.trim();
    if inner.is_empty() {
        return None;
    }
    Some(inner.split('.').map(|s| s.to_string()).collect())
}

/// Walk `data` through `path`'s dotted segments. A non-map encountered
/// mid-walk or a missing segment resolves to `null`. Integers are
/// normalized to floating point; all other leaf types pass through.
fn resolve_path(data: &Value, path: &[String]) -> Value {
    let mut current = data;
    for segment in path {
        match current.as_object().and_then(|m| m.get(segment)) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    normalize_number(current.clone())
}

fn normalize_number(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            let as_f64 = n.as_f64().unwrap_or(0.0);
            serde_json::Number::from_f64(as_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        other => other,
    }
}
