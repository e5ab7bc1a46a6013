//! Campaign feedback: simulated engagement metrics and rule-based recommendations.

use leadflow_types::event::LogLevel;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{SharedRng, optional_input};
use crate::workflow::handler::{HandlerContext, HandlerError, StepHandler};

/// Maximum number of recommendations returned.
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Open rate under which a send-timing change is suggested.
const SEND_TIMING_OPEN_RATE: f64 = 0.30;

/// Targets the simulated metrics are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MetricThresholds {
    #[serde(default = "default_open_rate_threshold")]
    pub open_rate_threshold: f64,
    #[serde(default = "default_reply_rate_threshold")]
    pub reply_rate_threshold: f64,
}

fn default_open_rate_threshold() -> f64 {
    0.25
}

fn default_reply_rate_threshold() -> f64 {
    0.05
}

impl Default for MetricThresholds {
    fn default() -> Self {
        Self {
            open_rate_threshold: default_open_rate_threshold(),
            reply_rate_threshold: default_reply_rate_threshold(),
        }
    }
}

/// Engagement numbers for one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CampaignMetrics {
    pub emails_sent: usize,
    pub opens: usize,
    pub replies: usize,
    pub clicks: usize,
    pub open_rate: f64,
    pub reply_rate: f64,
    pub click_rate: f64,
}

impl CampaignMetrics {
    pub fn from_rates(emails_sent: usize, open_rate: f64, reply_rate: f64, click_rate: f64) -> Self {
        let count = |rate: f64| (emails_sent as f64 * rate) as usize;
        Self {
            emails_sent,
            opens: count(open_rate),
            replies: count(reply_rate),
            clicks: count(click_rate),
            open_rate,
            reply_rate,
            click_rate,
        }
    }

    /// Typical cold-email ranges: open 20-35%, reply 2-8%, click 5-15%.
    pub fn simulate(emails_sent: usize, rng: &SharedRng) -> Self {
        let (open, reply, click) = rng.with(|r| {
            (
                r.gen_range(0.20..0.35),
                r.gen_range(0.02..0.08),
                r.gen_range(0.05..0.15),
            )
        });
        Self::from_rates(emails_sent, open, reply, click)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// A suggested campaign change awaiting approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: String,
    pub current_value: String,
    pub suggested_value: String,
    pub reason: String,
    pub confidence: f64,
    pub priority: Priority,
}

impl Recommendation {
    fn new(
        category: &str,
        current_value: &str,
        suggested_value: &str,
        reason: String,
        confidence: f64,
        priority: Priority,
    ) -> Self {
        Self {
            category: category.to_string(),
            current_value: current_value.to_string(),
            suggested_value: suggested_value.to_string(),
            reason,
            confidence,
            priority,
        }
    }
}

/// `0.234` → `23.4%`.
fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Apply the recommendation rules, highest priority and confidence first.
pub fn generate_recommendations(
    metrics: &CampaignMetrics,
    thresholds: &MetricThresholds,
) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if metrics.open_rate < thresholds.open_rate_threshold {
        recs.push(Recommendation::new(
            "subject_line",
            "Generic subject lines",
            "Try more personalized subject lines with company-specific details",
            format!(
                "Open rate ({}) is below target ({})",
                percent(metrics.open_rate),
                percent(thresholds.open_rate_threshold)
            ),
            0.85,
            Priority::High,
        ));
    }

    if metrics.reply_rate < thresholds.reply_rate_threshold {
        recs.push(Recommendation::new(
            "email_content",
            "Current email template",
            "Shorten email body and add more specific value proposition",
            format!(
                "Reply rate ({}) is below target ({})",
                percent(metrics.reply_rate),
                percent(thresholds.reply_rate_threshold)
            ),
            0.78,
            Priority::High,
        ));
    }

    recs.push(Recommendation::new(
        "icp_targeting",
        "Current industry: SaaS, Revenue: $20M-$200M",
        "Narrow to companies with $50M-$150M revenue for better fit",
        "Mid-market companies show higher engagement based on initial data".to_string(),
        0.72,
        Priority::Medium,
    ));

    if metrics.open_rate < SEND_TIMING_OPEN_RATE {
        recs.push(Recommendation::new(
            "send_timing",
            "Sending emails throughout the day",
            "Send emails Tuesday-Thursday, 9-11 AM in prospect's timezone",
            "Open rates typically higher during mid-week mornings".to_string(),
            0.80,
            Priority::Medium,
        ));
    }

    recs.push(Recommendation::new(
        "follow_up",
        "Single touchpoint",
        "Implement 3-touch sequence: Initial, +3 days, +7 days",
        "Multi-touch sequences increase response rates by 40-60%".to_string(),
        0.88,
        Priority::High,
    ));

    recs.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.confidence.total_cmp(&a.confidence))
    });
    recs.truncate(MAX_RECOMMENDATIONS);
    recs
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// `FeedbackTrainerAgent`: inputs `responses`, `campaign_metrics`; output
/// `{"recommendations", "campaign_metrics", "status"}`.
#[derive(Debug, Clone)]
pub struct FeedbackTrainerHandler {
    rng: SharedRng,
}

impl FeedbackTrainerHandler {
    pub fn new(rng: SharedRng) -> Self {
        Self { rng }
    }
}

fn status_only(status: &str) -> Map<String, Value> {
    let mut output = Map::new();
    output.insert("recommendations".into(), json!([]));
    output.insert("status".into(), json!(status));
    output
}

impl StepHandler for FeedbackTrainerHandler {
    async fn handle(
        &self,
        inputs: &Map<String, Value>,
        ctx: &HandlerContext,
    ) -> Result<Map<String, Value>, HandlerError> {
        ctx.log(LogLevel::Info, "Starting feedback analysis...");

        if !ctx.require_inputs(inputs, &["responses"]) {
            ctx.log(LogLevel::Error, "Missing responses input.");
            return Ok(status_only("failed"));
        }

        let responses: Vec<Value> = optional_input(inputs, "responses")?;
        let thresholds: MetricThresholds = optional_input(inputs, "campaign_metrics")?;

        if responses.is_empty() {
            ctx.log(LogLevel::Warning, "No responses to analyze.");
            return Ok(status_only("no_data"));
        }

        ctx.log(
            LogLevel::Info,
            format!("Analyzing {} email messages...", responses.len()),
        );

        let metrics = CampaignMetrics::simulate(responses.len(), &self.rng);
        ctx.log(
            LogLevel::Info,
            format!(
                "Campaign metrics - Open rate: {}, Reply rate: {}",
                percent(metrics.open_rate),
                percent(metrics.reply_rate)
            ),
        );

        let recommendations = generate_recommendations(&metrics, &thresholds);
        ctx.log(
            LogLevel::Success,
            format!(
                "Generated {} recommendations for improvement.",
                recommendations.len()
            ),
        );
        if let Some(top) = recommendations.first() {
            ctx.log(
                LogLevel::Info,
                format!("Top recommendation: {} - {}", top.category, top.suggested_value),
            );
        }

        let mut output = Map::new();
        output.insert(
            "recommendations".into(),
            serde_json::to_value(&recommendations)
                .map_err(|e| HandlerError::Failed(e.to_string()))?,
        );
        output.insert(
            "campaign_metrics".into(),
            serde_json::to_value(metrics).map_err(|e| HandlerError::Failed(e.to_string()))?,
        );
        output.insert("status".into(), json!("pending_approval"));
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
