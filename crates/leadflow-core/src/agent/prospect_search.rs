//! Prospect discovery against a fixed mock company database.

use std::time::Duration;

use leadflow_types::event::LogLevel;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{SharedRng, optional_input};
use crate::workflow::handler::{HandlerContext, HandlerError, StepHandler};

const REQUIRED_INPUTS: [&str; 4] = ["industry", "location", "employee_count", "signals"];

/// A company with a named decision-maker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub company: String,
    pub contact_name: String,
    pub email: String,
    pub linkedin: String,
    pub title: String,
    pub signal: String,
    pub revenue: u64,
    pub employee_count: u64,
}

/// Inclusive employee-count filter.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EmployeeRange {
    #[serde(default)]
    pub min: u64,
    #[serde(default)]
    pub max: Option<u64>,
}

impl EmployeeRange {
    pub fn contains(&self, count: u64) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

#[allow(clippy::too_many_arguments)]
fn lead(
    company: &str,
    contact_name: &str,
    email: &str,
    linkedin: &str,
    title: &str,
    signal: &str,
    revenue: u64,
    employee_count: u64,
) -> Lead {
    Lead {
        company: company.to_string(),
        contact_name: contact_name.to_string(),
        email: email.to_string(),
        linkedin: linkedin.to_string(),
        title: title.to_string(),
        signal: signal.to_string(),
        revenue,
        employee_count,
    }
}

/// The mock company database searched by the handler.
pub fn mock_companies() -> Vec<Lead> {
    vec![
        lead(
            "CloudSync Technologies",
            "Sarah Mitchell",
            "sarah.mitchell@cloudsync.io",
            "linkedin.com/in/sarahmitchell",
            "VP of Sales",
            "recent_funding",
            45_000_000,
            250,
        ),
        lead(
            "DataFlow Systems",
            "Michael Chen",
            "m.chen@dataflow.com",
            "linkedin.com/in/michaelchen",
            "Chief Revenue Officer",
            "hiring_for_sales",
            78_000_000,
            450,
        ),
        lead(
            "AutoScale Inc",
            "Jennifer Rodriguez",
            "jrodriguez@autoscale.io",
            "linkedin.com/in/jenniferrodriguez",
            "Head of Business Development",
            "recent_funding",
            32_000_000,
            180,
        ),
        lead(
            "SecureAPI Solutions",
            "David Park",
            "david@secureapi.com",
            "linkedin.com/in/davidpark",
            "VP of Marketing",
            "hiring_for_sales",
            125_000_000,
            620,
        ),
        lead(
            "MetricsPro Analytics",
            "Amanda Johnson",
            "ajohnson@metricspro.com",
            "linkedin.com/in/amandajohnson",
            "Director of Sales",
            "recent_funding",
            55_000_000,
            320,
        ),
        lead(
            "PipelineHub",
            "Robert Kim",
            "rkim@pipelinehub.io",
            "linkedin.com/in/robertkim",
            "Chief Operating Officer",
            "hiring_for_sales",
            89_000_000,
            410,
        ),
        lead(
            "RevOps Platform",
            "Lisa Thompson",
            "lisa.t@revopsplatform.com",
            "linkedin.com/in/lisathompson",
            "VP of Revenue Operations",
            "recent_funding",
            67_000_000,
            380,
        ),
        lead(
            "GrowthEngine AI",
            "James Wilson",
            "jwilson@growthengine.ai",
            "linkedin.com/in/jameswilson",
            "Head of Sales",
            "hiring_for_sales",
            42_000_000,
            215,
        ),
    ]
}

/// Companies within `range` whose signal is listed (any signal when `signals` is empty).
pub fn filter_by_icp(companies: &[Lead], range: EmployeeRange, signals: &[String]) -> Vec<Lead> {
    companies
        .iter()
        .filter(|c| range.contains(c.employee_count))
        .filter(|c| signals.is_empty() || signals.contains(&c.signal))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Mock data sources
// ---------------------------------------------------------------------------

/// Lookup services a step can list in its `tools`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Clay,
    Apollo,
}

impl DataSource {
    /// Match a tool name ignoring case and punctuation (`ClayAPI`, `clay_api`).
    pub fn from_tool_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "clayapi" | "clay" => Some(DataSource::Clay),
            "apolloapi" | "apollo" => Some(DataSource::Apollo),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DataSource::Clay => "Clay API",
            DataSource::Apollo => "Apollo API",
        }
    }

    fn catalogue(self) -> (&'static [&'static str], usize) {
        match self {
            DataSource::Clay => (
                &[
                    "AutoScale Inc",
                    "DataFlow Systems",
                    "CloudSync Technologies",
                    "PipelineHub",
                    "MetricsPro Analytics",
                    "RevOps Platform",
                ],
                4,
            ),
            DataSource::Apollo => (
                &[
                    "AutoScale Inc",
                    "DataFlow Systems",
                    "PipelineHub",
                    "GrowthBase AI",
                    "SalesNest Solutions",
                    "Leadify Co",
                ],
                5,
            ),
        }
    }

    /// Simulated lookup result for `query`.
    pub fn query(self, query: &str, rng: &SharedRng) -> Value {
        let (names, k) = self.catalogue();
        let results: Vec<&str> =
            rng.with(|r| names.choose_multiple(r, k).copied().collect());
        json!({
            "source": self.label(),
            "query": query,
            "results": results,
        })
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// `ProspectSearchAgent`: inputs `industry`, `location`, `employee_count`,
/// `signals`; output `{"leads": [...], "sources": [...]}`.
#[derive(Debug, Clone)]
pub struct ProspectSearchHandler {
    rng: SharedRng,
    latency: Duration,
}

impl ProspectSearchHandler {
    pub fn new(rng: SharedRng) -> Self {
        Self {
            rng,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Pick between `min(5, n)` and `min(8, n)` leads without replacement.
    fn sample(&self, matched: &[Lead]) -> Vec<Lead> {
        let n = matched.len();
        if n == 0 {
            return Vec::new();
        }
        self.rng.with(|r| {
            let count = r.gen_range(n.min(5)..=n.min(8));
            matched.choose_multiple(r, count).cloned().collect()
        })
    }
}

impl StepHandler for ProspectSearchHandler {
    async fn handle(
        &self,
        inputs: &Map<String, Value>,
        ctx: &HandlerContext,
    ) -> Result<Map<String, Value>, HandlerError> {
        ctx.log(LogLevel::Info, "Starting prospect search...");

        let industry = inputs.get("industry").and_then(Value::as_str).unwrap_or("N/A");
        let location = inputs.get("location").and_then(Value::as_str).unwrap_or("N/A");
        ctx.log(
            LogLevel::Info,
            format!("Searching for: {industry} companies in {location}"),
        );

        let mut output = Map::new();
        if !ctx.require_inputs(inputs, &REQUIRED_INPUTS) {
            ctx.log(LogLevel::Error, "Input validation failed. Returning empty leads.");
            output.insert("leads".into(), json!([]));
            return Ok(output);
        }

        let range: EmployeeRange = optional_input(inputs, "employee_count")?;
        let signals: Vec<String> = optional_input(inputs, "signals")?;

        let sources: Vec<DataSource> = ctx
            .tools
            .iter()
            .filter_map(|t| t.name().and_then(DataSource::from_tool_name))
            .collect();
        if !sources.is_empty() {
            let names: Vec<&str> = sources.iter().map(|s| s.label()).collect();
            ctx.log(LogLevel::Info, format!("Querying {}...", names.join(" and ")));
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let query = format!("{industry} companies in {location}");
        let lookups: Vec<Value> = sources.iter().map(|s| s.query(&query, &self.rng)).collect();

        let companies = mock_companies();
        let matched = filter_by_icp(&companies, range, &signals);
        let selected = self.sample(&matched);

        ctx.log_with_data(
            LogLevel::Success,
            format!("Found {} leads matching ICP filters.", selected.len()),
            json!({
                "total_searched": companies.len(),
                "matched_criteria": matched.len(),
                "returned": selected.len(),
            }),
        );
        if let Some(first) = selected.first() {
            ctx.log(
                LogLevel::Info,
                format!("Sample lead: {} - {}", first.company, first.contact_name),
            );
        }
        ctx.log(LogLevel::Success, "Prospect search completed successfully.");

        let leads = serde_json::to_value(&selected)
            .map_err(|e| HandlerError::Failed(format!("could not serialize leads: {e}")))?;
        output.insert("leads".into(), leads);
        output.insert("sources".into(), Value::Array(lookups));
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_types::workflow::ToolConfig;

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn standard_inputs() -> Map<String, Value> {
        inputs(json!({
            "industry": "SaaS",
            "location": "USA",
            "employee_count": {"min": 100, "max": 1000},
            "signals": ["recent_funding", "hiring_for_sales"]
        }))
    }

    #[test]
    fn test_filter_by_employee_range_inclusive() {
        let companies = mock_companies();
        let range = EmployeeRange { min: 250, max: Some(410) };
        let matched = filter_by_icp(&companies, range, &[]);
        let names: Vec<&str> = matched.iter().map(|l| l.company.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "CloudSync Technologies",
                "MetricsPro Analytics",
                "PipelineHub",
                "RevOps Platform"
            ]
        );
    }

    #[test]
    fn test_filter_by_signal() {
        let companies = mock_companies();
        let matched = filter_by_icp(
            &companies,
            EmployeeRange::default(),
            &["hiring_for_sales".to_string()],
        );
        assert_eq!(matched.len(), 4);
        assert!(matched.iter().all(|l| l.signal == "hiring_for_sales"));
    }

    #[tokio::test]
    async fn test_returns_five_to_eight_unique_leads() {
        for seed in 0..10 {
            let handler = ProspectSearchHandler::new(SharedRng::new(Some(seed)));
            let out = handler
                .handle(&standard_inputs(), &HandlerContext::detached("search"))
                .await
                .unwrap();
            let leads: Vec<Lead> = serde_json::from_value(out["leads"].clone()).unwrap();
            assert!((5..=8).contains(&leads.len()), "seed {seed}: {}", leads.len());

            let mut names: Vec<&str> = leads.iter().map(|l| l.company.as_str()).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), leads.len());
        }
    }

    #[tokio::test]
    async fn test_small_match_set_returns_all() {
        let handler = ProspectSearchHandler::new(SharedRng::new(Some(1)));
        let mut input = standard_inputs();
        input.insert("employee_count".into(), json!({"min": 600, "max": 700}));

        let out = handler
            .handle(&input, &HandlerContext::detached("search"))
            .await
            .unwrap();
        assert_eq!(out["leads"].as_array().unwrap().len(), 1);
        assert_eq!(out["leads"][0]["company"], json!("SecureAPI Solutions"));
    }

    #[tokio::test]
    async fn test_no_match_returns_empty() {
        let handler = ProspectSearchHandler::new(SharedRng::new(Some(1)));
        let mut input = standard_inputs();
        input.insert("employee_count".into(), json!({"min": 5000}));

        let out = handler
            .handle(&input, &HandlerContext::detached("search"))
            .await
            .unwrap();
        assert_eq!(out["leads"], json!([]));
    }

    #[tokio::test]
    async fn test_missing_inputs_returns_empty_leads() {
        let handler = ProspectSearchHandler::new(SharedRng::new(Some(1)));
        let out = handler
            .handle(&inputs(json!({"industry": "SaaS"})), &HandlerContext::detached("search"))
            .await
            .unwrap();
        assert_eq!(Value::Object(out), json!({"leads": []}));
    }

    #[tokio::test]
    async fn test_wrongly_typed_range_is_invalid_input() {
        let handler = ProspectSearchHandler::new(SharedRng::new(Some(1)));
        let mut input = standard_inputs();
        input.insert("employee_count".into(), json!("lots"));

        let err = handler
            .handle(&input, &HandlerContext::detached("search"))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_tool_sources_recorded() {
        let handler = ProspectSearchHandler::new(SharedRng::new(Some(2)));
        let tools = vec![
            ToolConfig::named("ClayAPI"),
            ToolConfig::new(json!({"name": "apollo_api", "config": {"limit": 5}})),
            ToolConfig::named("Slack"),
        ];
        let ctx = HandlerContext::detached("search").with_tools(tools);

        let out = handler.handle(&standard_inputs(), &ctx).await.unwrap();
        let sources = out["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0]["source"], json!("Clay API"));
        assert_eq!(sources[0]["results"].as_array().unwrap().len(), 4);
        assert_eq!(sources[1]["source"], json!("Apollo API"));
        assert_eq!(sources[1]["results"].as_array().unwrap().len(), 5);
        assert_eq!(sources[1]["query"], json!("SaaS companies in USA"));
    }

    #[test]
    fn test_data_source_from_tool_name() {
        assert_eq!(DataSource::from_tool_name("ClayAPI"), Some(DataSource::Clay));
        assert_eq!(DataSource::from_tool_name("Apollo-API"), Some(DataSource::Apollo));
        assert_eq!(DataSource::from_tool_name("HubSpot"), None);
    }
}
