//! Elasticsearch query task (§4.10, §6): builds a search request from a
//! closed set of query types, submits it over HTTP, and maps the response
//! (or fault) onto the task's fixed output/error contract.

use std::time::Instant;

use async_trait::async_trait;
use jobworker_shared::error::{ErrorKind, ErrorRecord};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use jobworker_runtime::task::{Task, TaskContext};

#[derive(Debug)]
enum QueryType {
    FranchiseIndex,
    RelatedFranchises,
}

#[derive(Debug, Deserialize)]
struct Input {
    #[serde(rename = "queryType")]
    query_type: String,
    #[serde(default)]
    filters: Value,
    #[serde(default = "default_size")]
    size: u32,
}

fn default_size() -> u32 {
    20
}

#[derive(Debug, Serialize)]
struct Output {
    hits: Vec<Value>,
    #[serde(rename = "totalHits")]
    total_hits: u64,
    #[serde(rename = "maxScore")]
    max_score: f64,
    #[serde(rename = "elapsedMs")]
    elapsed_ms: u128,
}

pub struct EsQueryTask {
    client: Client,
    base_url: String,
}

impl EsQueryTask {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn index_for(&self, query_type: &QueryType) -> &'static str {
        match query_type {
            QueryType::FranchiseIndex => "franchises",
            QueryType::RelatedFranchises => "franchises",
        }
    }

    fn build_body(&self, query_type: &QueryType, filters: &Value, size: u32) -> Value {
        match query_type {
            QueryType::FranchiseIndex => json!({
                "size": size,
                "query": { "bool": { "filter": filters_as_term_clauses(filters) } }
            }),
            QueryType::RelatedFranchises => json!({
                "size": size,
                "query": { "more_like_this": { "like": filters, "min_term_freq": 1, "min_doc_freq": 1 } }
            }),
        }
    }
}

fn filters_as_term_clauses(filters: &Value) -> Vec<Value> {
    match filters.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| json!({ "term": { k: v } }))
            .collect(),
        None => Vec::new(),
    }
}

#[async_trait]
impl Task for EsQueryTask {
    fn task_type(&self) -> &'static str {
        "es_query"
    }

    async fn execute(&self, ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
        let input: Input = serde_json::from_value(input).map_err(|e| ErrorRecord::new(ErrorKind::ParseError, e.to_string()))?;

        let query_type = match input.query_type.as_str() {
            "franchise_index" => QueryType::FranchiseIndex,
            "related_franchises" => QueryType::RelatedFranchises,
            other => {
                return Err(ErrorRecord::new(
                    ErrorKind::SearchQueryFailed,
                    format!("unknown query type '{other}'"),
                ))
            }
        };

        let index = self.index_for(&query_type);
        let body = self.build_body(&query_type, &input.filters, input.size);
        let url = format!("{}/{}/_search", self.base_url, index);

        let start = Instant::now();
        let response = tokio::time::timeout(
            ctx.deadline,
            self.client.post(&url).json(&body).send(),
        )
        .await
        .map_err(|_| ErrorRecord::new(ErrorKind::SearchTimeout, "search request exceeded the job deadline"))?
        .map_err(map_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ErrorRecord::new(ErrorKind::IndexNotFound, format!("index '{index}' not found")));
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ErrorRecord::new(
                ErrorKind::SearchQueryFailed,
                format!("search request failed with status {status}: {body_text}"),
            ));
        }

        let parsed: Value = response.json().await.map_err(|e| {
            ErrorRecord::new(ErrorKind::SearchQueryFailed, format!("malformed search response: {e}"))
        })?;

        let hits_array = parsed["hits"]["hits"].as_array().cloned().unwrap_or_default();
        let sources: Vec<Value> = hits_array
            .into_iter()
            .map(|h| h["_source"].clone())
            .collect();
        let total_hits = parsed["hits"]["total"]["value"].as_u64().unwrap_or(0);
        let max_score = parsed["hits"]["max_score"].as_f64().unwrap_or(0.0);

        let output = Output {
            hits: sources,
            total_hits,
            max_score,
            elapsed_ms: start.elapsed().as_millis(),
        };

        serde_json::to_value(output).map_err(|e| ErrorRecord::new(ErrorKind::Unknown, e.to_string()))
    }
}

fn map_transport_error(err: reqwest::Error) -> ErrorRecord {
    if err.is_timeout() {
        ErrorRecord::new(ErrorKind::SearchTimeout, "search request timed out")
    } else if err.is_connect() {
        ErrorRecord::new(ErrorKind::ElasticsearchConnectionFailed, err.to_string())
    } else {
        ErrorRecord::new(ErrorKind::SearchQueryFailed, err.to_string())
    }
}
