//! Response build task (§4.10): a thin `Task` adapter over C9's
//! [`ResponseBuilder`], letting the same template/schema/substitution
//! machinery be driven as an ordinary job like any other task type.

use std::sync::Arc;

use async_trait::async_trait;
use jobworker_shared::error::{ErrorKind, ErrorRecord};
use jobworker_shared::response_builder::ResponseBuilder;
use jobworker_shared::template_registry::TemplateRegistry;
use serde::Deserialize;
use serde_json::Value;

use jobworker_runtime::task::{Task, TaskContext};

#[derive(Debug, Deserialize)]
struct Input {
    #[serde(rename = "templateId")]
    template_id: String,
    #[serde(rename = "requestId")]
    request_id: String,
    #[serde(default)]
    data: Value,
}

pub struct ResponseBuildTask {
    registry: Arc<TemplateRegistry>,
    app_version: String,
}

impl ResponseBuildTask {
    pub fn new(registry: Arc<TemplateRegistry>, app_version: impl Into<String>) -> Self {
        Self {
            registry,
            app_version: app_version.into(),
        }
    }
}

#[async_trait]
impl Task for ResponseBuildTask {
    fn task_type(&self) -> &'static str {
        "response_build"
    }

    async fn execute(&self, _ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
        let input: Input = serde_json::from_value(input).map_err(|e| ErrorRecord::new(ErrorKind::ParseError, e.to_string()))?;

        let builder = ResponseBuilder::new(&self.registry, self.app_version.clone());
        let envelope = builder
            .build(&input.template_id, &input.request_id, &input.data)
            .await?;

        serde_json::to_value(envelope).map_err(|e| ErrorRecord::new(ErrorKind::Unknown, e.to_string()))
    }
}
