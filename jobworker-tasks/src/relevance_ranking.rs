//! Relevance ranking task (§4.10): pure, CPU-bound re-ranking of search
//! hits against detail records and a user profile. No external
//! dependency; the only suspension point is the 500ms wall-time check.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobworker_shared::error::{ErrorKind, ErrorRecord};
use jobworker_shared::logger::Field;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use jobworker_runtime::task::{Task, TaskContext};

use crate::match_score::profile_fit_score;
use crate::numeric::FlexNumber;

const SLOW_THRESHOLD_MS: u128 = 500;

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: String,
    score: FlexNumber,
}

#[derive(Debug, Deserialize)]
struct DetailRecord {
    id: String,
    name: String,
    #[serde(default)]
    views: Option<FlexNumber>,
    #[serde(default)]
    applications: Option<FlexNumber>,
    #[serde(rename = "updatedAt", default)]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Input {
    #[serde(rename = "searchResults")]
    search_results: Vec<SearchResult>,
    details: Vec<DetailRecord>,
    #[serde(default)]
    profile: Option<Value>,
    #[serde(rename = "maxItems")]
    max_items: usize,
}

#[derive(Debug, Serialize, Clone)]
struct RankedItem {
    id: String,
    name: String,
    #[serde(rename = "finalScore")]
    final_score: f64,
    #[serde(rename = "esScore")]
    es_score: f64,
    #[serde(rename = "matchScore")]
    match_score: f64,
    #[serde(rename = "popularityScore")]
    popularity_score: f64,
    #[serde(rename = "freshnessScore")]
    freshness_score: f64,
}

#[derive(Debug, Serialize)]
struct Output {
    results: Vec<RankedItem>,
}

fn es_score(raw_score: f64) -> f64 {
    (raw_score * 10.0).clamp(0.0, 100.0)
}

fn popularity_score(views: f64, applications: f64) -> f64 {
    let total = (views.max(0.0) + applications.max(0.0)) / 10.0;
    total.min(100.0)
}

fn freshness_score(updated_at: &Option<String>) -> f64 {
    let Some(raw) = updated_at else {
        return 50.0;
    };
    if raw.trim().is_empty() {
        return 50.0;
    }
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else {
        return 50.0;
    };
    let days = (Utc::now() - parsed.with_timezone(&Utc)).num_days();
    if days <= 30 {
        100.0
    } else if days <= 90 {
        80.0
    } else if days <= 180 {
        60.0
    } else if days <= 365 {
        40.0
    } else {
        20.0
    }
}

pub struct RelevanceRankingTask;

#[async_trait]
impl Task for RelevanceRankingTask {
    fn task_type(&self) -> &'static str {
        "relevance_ranking"
    }

    async fn execute(&self, ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
        let start = Instant::now();
        let input: Input = serde_json::from_value(input).map_err(|e| ErrorRecord::new(ErrorKind::ParseError, e.to_string()))?;

        let details: HashMap<&str, &DetailRecord> =
            input.details.iter().map(|d| (d.id.as_str(), d)).collect();

        let match_score = input
            .profile
            .as_ref()
            .and_then(|p| serde_json::from_value(p.clone()).ok())
            .map(|p| profile_fit_score(&p))
            .unwrap_or(50.0);

        let mut seen = std::collections::HashSet::new();
        let mut ranked = Vec::new();

        for result in input.search_results {
            if !seen.insert(result.id.clone()) {
                continue;
            }
            let Some(detail) = details.get(result.id.as_str()) else {
                continue;
            };

            let es = es_score(result.score.0);
            let popularity = popularity_score(
                detail.views.map(|v| v.0).unwrap_or(0.0),
                detail.applications.map(|v| v.0).unwrap_or(0.0),
            );
            let freshness = freshness_score(&detail.updated_at);
            let final_score = 0.4 * es + 0.3 * match_score + 0.2 * popularity + 0.1 * freshness;

            ranked.push(RankedItem {
                id: result.id.clone(),
                name: detail.name.clone(),
                final_score,
                es_score: es,
                match_score,
                popularity_score: popularity,
                freshness_score: freshness,
            });
        }

        ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        ranked.truncate(input.max_items);

        let elapsed = start.elapsed();
        if elapsed.as_millis() > SLOW_THRESHOLD_MS {
            ctx.logger.warn(
                "relevance ranking exceeded the 500ms budget",
                &[Field::new("elapsed_ms", elapsed.as_millis())],
            );
        }

        serde_json::to_value(Output { results: ranked })
            .map_err(|e| ErrorRecord::new(ErrorKind::Unknown, e.to_string()))
    }
}
