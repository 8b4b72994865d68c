//! Readiness score task (§4.10): pure arithmetic over a franchise
//! applicant's `applicationData`. No external dependency — `execute` never
//! suspends.

use async_trait::async_trait;
use jobworker_shared::error::{ErrorKind, ErrorRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use jobworker_runtime::task::{Task, TaskContext};

use crate::numeric::FlexNumber;

const FINANCIAL_WEIGHT: f64 = 0.30;
const EXPERIENCE_WEIGHT: f64 = 0.25;
const COMMITMENT_WEIGHT: f64 = 0.20;
const COMPATIBILITY_WEIGHT: f64 = 0.25;

#[derive(Debug, Default, Deserialize)]
struct ApplicationData {
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
    #[serde(rename = "applicationData")]
    application_data: ApplicationData,
}

#[derive(Debug, Serialize)]
struct Breakdown {
    financial: i64,
    experience: i64,
    commitment: i64,
    compatibility: i64,
}

#[derive(Debug, Serialize)]
struct Output {
    #[serde(rename = "readinessScore")]
    readiness_score: i64,
    #[serde(rename = "qualificationLevel")]
    qualification_level: &'static str,
    breakdown: Breakdown,
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

fn financial_score(data: &ApplicationData) -> f64 {
    let liquid_capital = data
        .liquid_capital
        .map(FlexNumber::clamp_non_negative)
        .unwrap_or(0.0);
    let net_worth = data
        .net_worth
        .map(FlexNumber::clamp_non_negative)
        .unwrap_or(0.0);
    let credit_score = data.credit_score.map(|v| v.clamp(300.0, 850.0)).unwrap_or(300.0);

    let liquid_score = threshold_score(liquid_capital, 500_000.0);
    let net_worth_score = threshold_score(net_worth, 1_000_000.0);
    let credit_score_score = threshold_score(credit_score - 300.0, 400.0);

    (liquid_score + net_worth_score + credit_score_score) / 3.0
}

fn experience_score(data: &ApplicationData) -> f64 {
    let years = data
        .years_in_industry
        .map(FlexNumber::clamp_non_negative)
        .unwrap_or(0.0);
    let years_score = threshold_score(years, 10.0);
    let management_score = bool_score(data.management_experience);
    let ownership_score = bool_score(data.business_ownership);

    (years_score + management_score + ownership_score) / 3.0
}

fn commitment_score(data: &ApplicationData) -> f64 {
    let time = data
        .time_availability
        .map(FlexNumber::clamp_non_negative)
        .unwrap_or(0.0);
    let time_score = threshold_score(time, 40.0);
    let relocation_score = bool_score(data.relocation_willing);

    (time_score + relocation_score) / 2.0
}

fn compatibility_score(data: &ApplicationData) -> f64 {
    let scores = [
        bool_score(data.category_match),
        bool_score(data.skill_alignment),
        bool_score(data.location_match),
    ];
    scores.iter().sum::<f64>() / scores.len() as f64
}

fn qualification_level(score: i64) -> &'static str {
    if score >= 81 {
        "excellent"
    } else if score >= 61 {
        "high"
    } else if score >= 41 {
        "medium"
    } else {
        "low"
    }
}

pub struct ReadinessScoreTask;

#[async_trait]
impl Task for ReadinessScoreTask {
    fn task_type(&self) -> &'static str {
        "readiness_score"
    }

    async fn execute(&self, _ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
        let input: Input = serde_json::from_value(input)
            .map_err(|e| ErrorRecord::new(ErrorKind::ParseError, e.to_string()))?;
        let data = input.application_data;

        let financial = financial_score(&data);
        let experience = experience_score(&data);
        let commitment = commitment_score(&data);
        let compatibility = compatibility_score(&data);

        let final_score = (financial * FINANCIAL_WEIGHT
            + experience * EXPERIENCE_WEIGHT
            + commitment * COMMITMENT_WEIGHT
            + compatibility * COMPATIBILITY_WEIGHT)
            .trunc() as i64;

        let output = Output {
            readiness_score: final_score,
            qualification_level: qualification_level(final_score),
            breakdown: Breakdown {
                financial: financial.trunc() as i64,
                experience: experience.trunc() as i64,
                commitment: commitment.trunc() as i64,
                compatibility: compatibility.trunc() as i64,
            },
        };

        serde_json::to_value(output).map_err(|e| ErrorRecord::new(ErrorKind::Unknown, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobworker_shared::logger::Logger;
    use serde_json::json;
    use std::time::Duration;

    fn ctx() -> TaskContext {
        TaskContext::new(1, Duration::from_secs(5), Logger::noop())
    }

    #[tokio::test]
    async fn max_inputs_score_one_hundred_excellent() {
        let task = ReadinessScoreTask;
        let input = json!({
            "applicationData": {
                "liquidCapital": 1_000_000,
                "netWorth": 2_000_000,
                "creditScore": 750,
                "yearsInIndustry": 10,
                "managementExperience": true,
                "businessOwnership": true,
                "timeAvailability": 40,
                "relocationWilling": true,
                "categoryMatch": true,
                "skillAlignment": true,
                "locationMatch": true
            }
        });

        let out = task.execute(&ctx(), input).await.unwrap();
        assert_eq!(out["readinessScore"], 100);
        assert_eq!(out["qualificationLevel"], "excellent");
        assert_eq!(out["breakdown"]["financial"], 100);
        assert_eq!(out["breakdown"]["experience"], 100);
        assert_eq!(out["breakdown"]["commitment"], 100);
        assert_eq!(out["breakdown"]["compatibility"], 100);
    }

    #[tokio::test]
    async fn empty_application_data_scores_zero_low() {
        let task = ReadinessScoreTask;
        let out = task
            .execute(&ctx(), json!({"applicationData": {}}))
            .await
            .unwrap();
        assert_eq!(out["readinessScore"], 0);
        assert_eq!(out["qualificationLevel"], "low");
    }

    #[tokio::test]
    async fn comma_stripped_string_inputs_parse_correctly() {
        let task = ReadinessScoreTask;
        let out = task
            .execute(
                &ctx(),
                json!({"applicationData": {"liquidCapital": "1,000,000", "netWorth": "2,000,000", "creditScore": "750"}}),
            )
            .await
            .unwrap();
        assert_eq!(out["breakdown"]["financial"], 100);
    }

    #[tokio::test]
    async fn negative_inputs_clamp_to_zero() {
        let task = ReadinessScoreTask;
        let out = task
            .execute(
                &ctx(),
                json!({"applicationData": {"liquidCapital": -500, "yearsInIndustry": -3, "timeAvailability": -10}}),
            )
            .await
            .unwrap();
        assert_eq!(out["breakdown"]["financial"], 0);
        assert_eq!(out["breakdown"]["experience"], 0);
        assert_eq!(out["breakdown"]["commitment"], 0);
    }

    #[tokio::test]
    async fn credit_score_clamps_to_max_850() {
        let task = ReadinessScoreTask;
        let out = task
            .execute(&ctx(), json!({"applicationData": {"creditScore": 2000}}))
            .await
            .unwrap();
        // (850-300)/400*100 clamped to 100, averaged with two zero components.
        let financial = out["breakdown"]["financial"].as_i64().unwrap();
        assert_eq!(financial, 33);
    }

    #[test]
    fn qualification_level_boundaries() {
        assert_eq!(qualification_level(81), "excellent");
        assert_eq!(qualification_level(80), "high");
        assert_eq!(qualification_level(61), "high");
        assert_eq!(qualification_level(60), "medium");
        assert_eq!(qualification_level(41), "medium");
        assert_eq!(qualification_level(40), "low");
    }

    #[tokio::test]
    async fn malformed_boolean_is_parse_error() {
        let task = ReadinessScoreTask;
        let err = task
            .execute(
                &ctx(),
                json!({"applicationData": {"managementExperience": "yes"}}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind.wire_code(""), "PARSE_ERROR");
    }
}
