//! ICP-fit scoring and ranking of leads.

use std::cmp::Ordering;

use leadflow_types::event::LogLevel;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{object_list, optional_input, str_field};
use crate::workflow::handler::{HandlerContext, HandlerError, StepHandler};

const DEFAULT_REVENUE: f64 = 50_000_000.0;
const DEFAULT_EMPLOYEES: f64 = 300.0;

/// Factor weights; each factor score is on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScoringCriteria {
    #[serde(default = "default_revenue_weight")]
    pub revenue_weight: f64,
    #[serde(default = "default_employee_count_weight")]
    pub employee_count_weight: f64,
    #[serde(default = "default_signal_weight")]
    pub signal_weight: f64,
}

fn default_revenue_weight() -> f64 {
    0.3
}

fn default_employee_count_weight() -> f64 {
    0.2
}

fn default_signal_weight() -> f64 {
    0.5
}

impl Default for ScoringCriteria {
    fn default() -> Self {
        Self {
            revenue_weight: default_revenue_weight(),
            employee_count_weight: default_employee_count_weight(),
            signal_weight: default_signal_weight(),
        }
    }
}

/// Revenue fit: full marks from 200M, 50-100 linear over 20M-200M, below that 0-50.
pub fn revenue_score(revenue: f64) -> f64 {
    if revenue >= 200_000_000.0 {
        100.0
    } else if revenue >= 20_000_000.0 {
        50.0 + (revenue - 20_000_000.0) / 180_000_000.0 * 50.0
    } else {
        revenue / 20_000_000.0 * 50.0
    }
}

/// Size fit: 100-1000 employees is ideal.
pub fn employee_score(employees: f64) -> f64 {
    if (100.0..=1000.0).contains(&employees) {
        100.0
    } else if employees > 1000.0 {
        80.0
    } else {
        employees / 100.0 * 80.0
    }
}

/// Weighted score of one lead, capped at 100 and rounded to two decimals.
pub fn score_lead(lead: &Map<String, Value>, criteria: &ScoringCriteria) -> f64 {
    let revenue = lead.get("revenue").and_then(Value::as_f64).unwrap_or(DEFAULT_REVENUE);
    let employees = lead
        .get("employee_count")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_EMPLOYEES);
    let signal = if lead.get("signal").is_some_and(is_truthy) {
        100.0
    } else {
        50.0
    };

    let total = revenue_score(revenue) * criteria.revenue_weight
        + employee_score(employees) * criteria.employee_count_weight
        + signal * criteria.signal_weight;
    (total.min(100.0) * 100.0).round() / 100.0
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Score, sort descending (ties keep input order) and number the leads from 1.
pub fn rank_leads(leads: &[&Map<String, Value>], criteria: &ScoringCriteria) -> Vec<Map<String, Value>> {
    let mut scored: Vec<(f64, Map<String, Value>)> = leads
        .iter()
        .map(|lead| (score_lead(lead, criteria), (*lead).clone()))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (score, mut lead))| {
            lead.insert("score".into(), json!(score));
            lead.insert("ranking".into(), json!(i + 1));
            lead
        })
        .collect()
}

/// `ScoringAgent`: inputs `leads`, `scoring_criteria`; output `{"ranked_leads": [...]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringHandler;

impl StepHandler for ScoringHandler {
    async fn handle(
        &self,
        inputs: &Map<String, Value>,
        ctx: &HandlerContext,
    ) -> Result<Map<String, Value>, HandlerError> {
        ctx.log(LogLevel::Info, "Starting lead scoring...");

        let mut output = Map::new();
        if !ctx.require_inputs(inputs, &["leads"]) {
            ctx.log(LogLevel::Error, "Missing leads input. Returning empty results.");
            output.insert("ranked_leads".into(), json!([]));
            return Ok(output);
        }

        let leads = object_list(inputs, "leads")?;
        let criteria: ScoringCriteria = optional_input(inputs, "scoring_criteria")?;

        if leads.is_empty() {
            ctx.log(LogLevel::Warning, "No leads to score.");
            output.insert("ranked_leads".into(), json!([]));
            return Ok(output);
        }

        ctx.log(LogLevel::Info, format!("Scoring {} leads...", leads.len()));
        let ranked = rank_leads(&leads, &criteria);

        if let (Some(top), Some(bottom)) = (ranked.first(), ranked.last()) {
            ctx.log(
                LogLevel::Success,
                format!(
                    "Scoring complete. Top lead: {} (Score: {})",
                    str_field(top, "company", "Unknown"),
                    top["score"]
                ),
            );
            ctx.log(
                LogLevel::Info,
                format!("Score range: {} to {}", bottom["score"], top["score"]),
            );
        }

        output.insert(
            "ranked_leads".into(),
            Value::Array(ranked.into_iter().map(Value::Object).collect()),
        );
        Ok(output)
    }
}
