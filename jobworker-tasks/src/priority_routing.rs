//! Priority routing task (§4.10): classifies a franchise account via C4,
//! swallowing both "not found" and loader faults into the `standard`/`low`
//! default — a deliberate domain policy, not C4's general contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobworker_shared::cache::{CacheRead, CacheThroughReader, FastStore, Loader};
use jobworker_shared::error::ErrorRecord;
use jobworker_shared::logger::Field;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use jobworker_runtime::task::{Task, TaskContext};

#[derive(Debug, Deserialize)]
struct Input {
    #[serde(rename = "franchiseId")]
    franchise_id: String,
}

#[derive(Debug, Serialize)]
struct Output {
    #[serde(rename = "isPremiumFranchisor")]
    is_premium_franchisor: bool,
    #[serde(rename = "routingPriority")]
    routing_priority: &'static str,
}

impl Output {
    fn for_status(status: &str) -> Self {
        match status {
            "premium" => Output {
                is_premium_franchisor: true,
                routing_priority: "high",
            },
            "verified" => Output {
                is_premium_franchisor: false,
                routing_priority: "medium",
            },
            _ => Output {
                is_premium_franchisor: false,
                routing_priority: "low",
            },
        }
    }
}

fn normalize_status(status: String) -> String {
    match status.as_str() {
        "premium" | "verified" | "standard" => status,
        _ => "standard".to_string(),
    }
}

pub struct PriorityRoutingTask {
    fast_store: Arc<dyn FastStore>,
    loader: Arc<dyn Loader<String>>,
    ttl: Duration,
}

impl PriorityRoutingTask {
    pub fn new(fast_store: Arc<dyn FastStore>, loader: Arc<dyn Loader<String>>, ttl: Duration) -> Self {
        Self {
            fast_store,
            loader,
            ttl,
        }
    }
}

#[async_trait]
impl Task for PriorityRoutingTask {
    fn task_type(&self) -> &'static str {
        "priority_routing"
    }

    fn input_schema(&self) -> Option<&Value> {
        static SCHEMA: std::sync::OnceLock<Value> = std::sync::OnceLock::new();
        Some(SCHEMA.get_or_init(|| {
            json!({
                "type": "object",
                "required": ["franchiseId"],
                "properties": { "franchiseId": { "type": "string" } }
            })
        }))
    }

    async fn execute(&self, ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
        let input: Input = serde_json::from_value(input)
            .map_err(|e| ErrorRecord::new(jobworker_shared::error::ErrorKind::ParseError, e.to_string()))?;

        let key = format!("franchisor:account:{}", input.franchise_id);
        let reader = CacheThroughReader::new(
            self.fast_store.as_ref(),
            self.loader.as_ref(),
            self.ttl,
            &ctx.logger,
        );

        let normalize = |s: String| normalize_status(s);
        let output = match reader.read(&key, Some(&normalize)).await {
            Ok(CacheRead::Found(status)) => Output::for_status(&status),
            Ok(CacheRead::NotFound) => Output::for_status("standard"),
            Err(err) => {
                ctx.logger.warn(
                    "priority routing lookup failed, defaulting to standard",
                    &[Field::new("error", err.message)],
                );
                Output::for_status("standard")
            }
        };

        serde_json::to_value(output)
            .map_err(|e| ErrorRecord::new(jobworker_shared::error::ErrorKind::Unknown, e.to_string()))
    }
}
