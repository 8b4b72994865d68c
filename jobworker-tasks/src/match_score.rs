//! Match score task (§4.10): readiness-style scoring against a specific
//! franchise, using a profile supplied inline or fetched through C4 by
//! `userId`. Unlike priority routing, a cache-read fault here is not
//! swallowed — it is a task default only when no profile exists at all.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobworker_shared::cache::{CacheRead, CacheThroughReader, FastStore, Loader};
use jobworker_shared::error::{ErrorKind, ErrorRecord};
use jobworker_shared::logger::Field;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use jobworker_runtime::task::{Task, TaskContext};

use crate::numeric::FlexNumber;

const FINANCIAL_WEIGHT: f64 = 0.30;
const EXPERIENCE_WEIGHT: f64 = 0.25;
const COMMITMENT_WEIGHT: f64 = 0.20;
const COMPATIBILITY_WEIGHT: f64 = 0.25;
const DEFAULT_FACTOR: f64 = 50.0;

#[derive(Debug, Default, Deserialize, Clone)]
pub(crate) struct Profile {
    #[serde(rename = "liquidCapital", default)]
    liquid_capital: Option<FlexNumber>,
    #[serde(rename = "netWorth", default)]
    net_worth: Option<FlexNumber>,
    #[serde(rename = "creditScore", default)]
    credit_score: Option<FlexNumber>,
    #[serde(rename = "yearsInIndustry", default)]
    years_in_industry: Option<FlexNumber>,
    #[serde(rename = "managementExperience", default)]
    management_experience: bool,
    #[serde(rename = "businessOwnership", default)]
    business_ownership: bool,
    #[serde(rename = "timeAvailability", default)]
    time_availability: Option<FlexNumber>,
    #[serde(rename = "relocationWilling", default)]
    relocation_willing: bool,
    #[serde(rename = "categoryMatch", default)]
    category_match: bool,
    #[serde(rename = "skillAlignment", default)]
    skill_alignment: bool,
    #[serde(rename = "locationMatch", default)]
    location_match: bool,
}

#[derive(Debug, Deserialize)]
struct Input {
    #[serde(rename = "franchiseId")]
    franchise_id: String,
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Serialize)]
struct Output {
    #[serde(rename = "franchiseId")]
    franchise_id: String,
    #[serde(rename = "matchScore")]
    match_score: i64,
    #[serde(rename = "financialFactor")]
    financial_factor: i64,
    #[serde(rename = "experienceFactor")]
    experience_factor: i64,
    #[serde(rename = "commitmentFactor")]
    commitment_factor: i64,
    #[serde(rename = "compatibilityFactor")]
    compatibility_factor: i64,
}

fn threshold_score(value: f64, full_credit_at: f64) -> f64 {
    if full_credit_at <= 0.0 {
        return 100.0;
    }
    (value / full_credit_at * 100.0).clamp(0.0, 100.0)
}

fn bool_score(flag: bool) -> f64 {
    if flag {
        100.0
    } else {
        0.0
    }
}

fn financial_factor(p: &Profile) -> f64 {
    let liquid_capital = p.liquid_capital.map(FlexNumber::clamp_non_negative).unwrap_or(0.0);
    let net_worth = p.net_worth.map(FlexNumber::clamp_non_negative).unwrap_or(0.0);
    let credit_score = p.credit_score.map(|v| v.clamp(300.0, 850.0)).unwrap_or(300.0);

    let liquid_score = threshold_score(liquid_capital, 500_000.0);
    let net_worth_score = threshold_score(net_worth, 1_000_000.0);
    let credit_score_score = threshold_score(credit_score - 300.0, 400.0);

    (liquid_score + net_worth_score + credit_score_score) / 3.0
}

fn experience_factor(p: &Profile) -> f64 {
    let years = p.years_in_industry.map(FlexNumber::clamp_non_negative).unwrap_or(0.0);
    let years_score = threshold_score(years, 10.0);
    (years_score + bool_score(p.management_experience) + bool_score(p.business_ownership)) / 3.0
}

fn commitment_factor(p: &Profile) -> f64 {
    let time = p.time_availability.map(FlexNumber::clamp_non_negative).unwrap_or(0.0);
    let time_score = threshold_score(time, 40.0);
    (time_score + bool_score(p.relocation_willing)) / 2.0
}

fn compatibility_factor(p: &Profile) -> f64 {
    let scores = [
        bool_score(p.category_match),
        bool_score(p.skill_alignment),
        bool_score(p.location_match),
    ];
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Single overall fit score for a profile, independent of any specific
/// franchise — the shared ingredient relevance ranking folds into its
/// `finalScore` alongside the per-result ES, popularity, and freshness
/// scores.
pub(crate) fn profile_fit_score(p: &Profile) -> f64 {
    (financial_factor(p) + experience_factor(p) + commitment_factor(p) + compatibility_factor(p)) / 4.0
}

pub struct MatchScoreTask {
    fast_store: Arc<dyn FastStore>,
    loader: Arc<dyn Loader<String>>,
    ttl: Duration,
}

impl MatchScoreTask {
    pub fn new(fast_store: Arc<dyn FastStore>, loader: Arc<dyn Loader<String>>, ttl: Duration) -> Self {
        Self {
            fast_store,
            loader,
            ttl,
        }
    }

    async fn resolve_profile(&self, ctx: &TaskContext, user_id: &str) -> Option<Profile> {
        let key = format!("user:profile:{user_id}");
        let reader = CacheThroughReader::new(self.fast_store.as_ref(), self.loader.as_ref(), self.ttl, &ctx.logger);

        match reader.read(&key, None).await {
            Ok(CacheRead::Found(raw)) => serde_json::from_str(&raw).ok(),
            Ok(CacheRead::NotFound) => None,
            Err(err) => {
                ctx.logger.warn(
                    "profile fetch failed, falling back to neutral factors",
                    &[Field::new("error", err.message)],
                );
                None
            }
        }
    }
}

#[async_trait]
impl Task for MatchScoreTask {
    fn task_type(&self) -> &'static str {
        "match_score"
    }

    async fn execute(&self, ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
        let input: Input = serde_json::from_value(input).map_err(|e| ErrorRecord::new(ErrorKind::ParseError, e.to_string()))?;

        let profile = match input.profile {
            Some(p) => Some(p),
            None => self.resolve_profile(ctx, &input.user_id).await,
        };

        let (financial, experience, commitment, compatibility) = match &profile {
            Some(p) => (
                financial_factor(p),
                experience_factor(p),
                commitment_factor(p),
                compatibility_factor(p),
            ),
            None => (DEFAULT_FACTOR, DEFAULT_FACTOR, DEFAULT_FACTOR, DEFAULT_FACTOR),
        };

        let final_score = (financial * FINANCIAL_WEIGHT
            + experience * EXPERIENCE_WEIGHT
            + commitment * COMMITMENT_WEIGHT
            + compatibility * COMPATIBILITY_WEIGHT)
            .trunc() as i64;

        let output = Output {
            franchise_id: input.franchise_id,
            match_score: final_score,
            financial_factor: financial.trunc() as i64,
            experience_factor: experience.trunc() as i64,
            commitment_factor: commitment.trunc() as i64,
            compatibility_factor: compatibility.trunc() as i64,
        };

        serde_json::to_value(output).map_err(|e| ErrorRecord::new(ErrorKind::Unknown, e.to_string()))
    }
}
