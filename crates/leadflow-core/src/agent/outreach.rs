//! Cold email drafting for the top-ranked leads.
//!
//! Template mode fills fixed copy keyed on the lead's buying signal. When an
//! LLM provider is configured the email is written by the model instead, and
//! a failed completion falls back to a short canned draft for that lead.

use std::sync::Arc;

use leadflow_types::config::LlmSettings;
use leadflow_types::event::LogLevel;
use leadflow_types::llm::{CompletionRequest, Message};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{object_list, str_field};
use crate::llm::BoxLlmProvider;
use crate::workflow::handler::{HandlerContext, HandlerError, StepHandler};

pub const GENERATED_BY_TEMPLATE: &str = "template";
pub const GENERATED_BY_LLM: &str = "openai_gpt4o_mini";
pub const GENERATED_BY_MOCK: &str = "mock_gpt";

const SYSTEM_PROMPT: &str = "You are an expert B2B sales email writer.";

/// One drafted email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachMessage {
    /// Company name.
    pub lead: String,
    pub email: String,
    pub contact_name: String,
    pub subject: String,
    pub email_body: String,
    pub generated_by: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OutreachOptions {
    #[serde(default = "default_top_n")]
    top_n: usize,
    #[serde(default = "default_persona")]
    persona: String,
    #[serde(default = "default_tone")]
    tone: String,
}

fn default_top_n() -> usize {
    10
}

fn default_persona() -> String {
    "SDR".to_string()
}

fn default_tone() -> String {
    "professional and friendly".to_string()
}

impl OutreachOptions {
    /// Read the optional settings from the step inputs; other keys are ignored.
    fn from_inputs(inputs: &Map<String, Value>) -> Result<Self, HandlerError> {
        serde_json::from_value(Value::Object(inputs.clone()))
            .map_err(|e| HandlerError::InvalidInput(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Lead view
// ---------------------------------------------------------------------------

/// The lead fields the drafts use.
#[derive(Debug, Clone)]
struct LeadView<'a> {
    company: &'a str,
    contact_name: &'a str,
    title: &'a str,
    signal: &'a str,
    email: &'a str,
    score: Value,
}

impl<'a> LeadView<'a> {
    fn new(lead: &'a Map<String, Value>, default_company: &'a str) -> Self {
        Self {
            company: str_field(lead, "company", default_company),
            contact_name: str_field(lead, "contact_name", ""),
            title: str_field(lead, "title", ""),
            signal: str_field(lead, "signal", ""),
            email: str_field(lead, "email", ""),
            score: lead.get("score").cloned().unwrap_or(json!(0)),
        }
    }

    fn first_name(&self) -> &'a str {
        self.contact_name.split_whitespace().next().unwrap_or("there")
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Subject line keyed on the buying signal.
pub fn template_subject(company: &str, signal: &str) -> String {
    match signal {
        "recent_funding" => format!("Congrats on {company}'s recent funding!"),
        "hiring_for_sales" => format!("Scaling {company}'s sales team?"),
        _ => format!("Quick idea for {company}"),
    }
}

/// Email body keyed on the buying signal.
pub fn template_body(first_name: &str, company: &str, signal: &str) -> String {
    let opening = match signal {
        "recent_funding" => {
            format!("I saw that {company} recently raised funding - congrats! That's exciting.")
        }
        "hiring_for_sales" => format!(
            "I noticed {company} is actively hiring for sales roles. Looks like you're scaling!"
        ),
        _ => format!(
            "I've been following {company}'s growth and I'm impressed with what you're building."
        ),
    };

    format!(
        "Hi {first_name},

{opening}

I'm reaching out because we work with similar B2B companies to help them streamline their data analytics and improve decision-making processes.

Companies like yours often struggle with:
• Fragmented data across multiple tools
• Time-consuming manual reporting
• Difficulty identifying growth opportunities

Our platform at Analytos.ai helps solve these challenges by providing AI-powered analytics that surface actionable insights automatically.

Would you be open to a quick 15-minute call next week to explore if this could help {company}?

I'd love to share some specific ideas based on what I've seen work for companies in your space.

Best regards,
SDR Team
Analytos.ai

P.S. No pressure - if the timing isn't right, I completely understand. Just let me know!"
    )
}

/// Canned draft used when an LLM completion fails.
pub fn mock_gpt_draft(company: &str) -> (String, String) {
    (
        format!("Scaling {company}'s sales team?"),
        format!(
            "Hi team {company},\n\nWe noticed your recent growth and wanted to introduce \
             our lead optimization platform to help scale your outreach.\n\nBest,\nShreya"
        ),
    )
}

fn llm_prompt(lead: &LeadView<'_>, persona: &str, tone: &str) -> String {
    let company = lead.company;
    let first_name = lead.first_name();
    let title = lead.title;
    let signal_context = match lead.signal {
        "recent_funding" => format!("{company} recently raised funding"),
        "hiring_for_sales" => format!("{company} is actively hiring for sales roles"),
        _ => "Growing B2B company".to_string(),
    };
    let score = &lead.score;

    format!(
        "You are a {persona} writing a cold outreach email to {first_name} ({title}) at {company}.

Context:
- Company: {company}
- Contact: {first_name} {title}
- Signal: {signal_context}
- Lead Score: {score}/100 (high fit for our ICP)

Task: Write a personalized cold email with:
1. A compelling subject line (max 60 characters)
2. Email body that:
   - Opens with the signal/context
   - Introduces Analytos.ai (AI-powered analytics for B2B companies)
   - Mentions 2-3 pain points we solve (fragmented data, manual reporting, missed opportunities)
   - Includes a soft call-to-action (15-min call)
   - Uses a {tone} tone
   - Keeps it under 150 words
   - Ends with \"Best regards, SDR Team, Analytos.ai\"

Format your response as:
SUBJECT: [subject line here]

BODY:
[email body here]"
    )
}

/// Split a `SUBJECT: ... BODY: ...` completion into subject and body.
///
/// Without a `BODY:` marker the whole completion is used as the body.
pub fn parse_completion(content: &str) -> (String, String) {
    match content.split_once("BODY:") {
        Some((head, body)) => (
            head.replace("SUBJECT:", "").trim().to_string(),
            body.trim().to_string(),
        ),
        None => (
            content.replace("SUBJECT:", "").trim().to_string(),
            content.to_string(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// `OutreachContentAgent`: inputs `ranked_leads`, `top_n`, `persona`, `tone`;
/// output `{"messages": [...]}`.
#[derive(Debug, Clone, Default)]
pub struct OutreachContentHandler {
    llm: Option<Arc<BoxLlmProvider>>,
    settings: LlmSettings,
}

impl OutreachContentHandler {
    pub fn new(llm: Option<Arc<BoxLlmProvider>>, settings: LlmSettings) -> Self {
        Self { llm, settings }
    }

    /// Template-only handler.
    pub fn template() -> Self {
        Self::default()
    }

    fn template_message(&self, lead: &LeadView<'_>) -> OutreachMessage {
        OutreachMessage {
            lead: lead.company.to_string(),
            email: lead.email.to_string(),
            contact_name: lead.contact_name.to_string(),
            subject: template_subject(lead.company, lead.signal),
            email_body: template_body(lead.first_name(), lead.company, lead.signal),
            generated_by: GENERATED_BY_TEMPLATE.to_string(),
        }
    }

    async fn llm_message(
        &self,
        provider: &BoxLlmProvider,
        lead: &LeadView<'_>,
        options: &OutreachOptions,
        ctx: &HandlerContext,
    ) -> OutreachMessage {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(llm_prompt(lead, &options.persona, &options.tone)),
            ],
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
        };

        match provider.complete(&request).await {
            Ok(response) => {
                let (subject, email_body) = parse_completion(&response.content);
                OutreachMessage {
                    lead: lead.company.to_string(),
                    email: lead.email.to_string(),
                    contact_name: lead.contact_name.to_string(),
                    subject,
                    email_body,
                    generated_by: GENERATED_BY_LLM.to_string(),
                }
            }
            Err(e) => {
                ctx.log(
                    LogLevel::Warning,
                    format!("GPT generation failed: {e}. Using mock GPT instead."),
                );
                let (subject, email_body) = mock_gpt_draft(lead.company);
                OutreachMessage {
                    lead: lead.company.to_string(),
                    email: lead.email.to_string(),
                    contact_name: lead.contact_name.to_string(),
                    subject,
                    email_body,
                    generated_by: GENERATED_BY_MOCK.to_string(),
                }
            }
        }
    }
}

impl StepHandler for OutreachContentHandler {
    async fn handle(
        &self,
        inputs: &Map<String, Value>,
        ctx: &HandlerContext,
    ) -> Result<Map<String, Value>, HandlerError> {
        ctx.log(LogLevel::Info, "Starting outreach content generation...");

        let mut output = Map::new();
        if !ctx.require_inputs(inputs, &["ranked_leads"]) {
            ctx.log(LogLevel::Error, "Missing ranked_leads input.");
            output.insert("messages".into(), json!([]));
            return Ok(output);
        }

        let ranked = object_list(inputs, "ranked_leads")?;
        let options = OutreachOptions::from_inputs(inputs)?;

        if ranked.is_empty() {
            ctx.log(LogLevel::Warning, "No leads to generate content for.");
            output.insert("messages".into(), json!([]));
            return Ok(output);
        }

        let top: Vec<&Map<String, Value>> = ranked.into_iter().take(options.top_n).collect();
        let mode = match &self.llm {
            Some(provider) => format!("LLM ({})", provider.model()),
            None => "Template-based".to_string(),
        };
        ctx.log(
            LogLevel::Info,
            format!(
                "Generating personalized emails for top {} leads using {mode}...",
                top.len()
            ),
        );

        let mut messages = Vec::with_capacity(top.len());
        for (i, record) in top.iter().enumerate() {
            let default_company = if self.llm.is_some() { "the company" } else { "your company" };
            let lead = LeadView::new(record, default_company);
            ctx.log(
                LogLevel::Info,
                format!(
                    "  Generating email {}/{} for {}",
                    i + 1,
                    top.len(),
                    str_field(record, "company", "Unknown")
                ),
            );

            let message = match &self.llm {
                Some(provider) => self.llm_message(provider, &lead, &options, ctx).await,
                None => self.template_message(&lead),
            };
            messages.push(message);
        }

        ctx.log(
            LogLevel::Success,
            format!("Generated {} personalized email messages.", messages.len()),
        );
        if let Some(first) = messages.first() {
            ctx.log(LogLevel::Info, format!("Sample subject: {}", first.subject));
        }

        let messages = serde_json::to_value(&messages)
            .map_err(|e| HandlerError::Failed(format!("could not serialize messages: {e}")))?;
        output.insert("messages".into(), messages);
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
