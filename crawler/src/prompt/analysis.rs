use async_trait::async_trait;
use indoc::formatdoc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{app_config::AiConfig, error::AnalysisError, jira::Ticket, HttpClient};

use super::{
    chat::{ChatApiResponseOrError, ChatMessage, ChatRequest, FinishReason, ResponseFormat},
    IssueAnalyzer,
};

const CHAT_PATH: &str = "chat/completions";
const PROMPT_DATE_FORMAT: &str = "%Y-%m-%d";

const EXTENDED_SCHEMA: &str = r#",
    "sla_level": "string - SLA level the issue falls under",
    "is_overdue": "boolean - whether the issue missed its SLA""#;

/// Structured verdict for one ticket. Every key is required in the reply.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AnalysisResult {
    pub module_category: String,
    pub symptom_category: String,
    pub symptom_description: String,
    pub root_cause_category: String,
    pub root_cause_description: String,
    pub solution_category: String,
    pub solution_description: String,
    pub is_closed: bool,
    pub is_fixed: bool,
    pub defect_type: String,
    pub technical_debt_description: String,
    pub industry_solution: String,
    pub gap_analysis: String,
    /// Only populated when the extended schema was requested
    #[serde(skip)]
    pub extended: Option<ExtendedAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ExtendedAnalysis {
    pub sla_level: String,
    pub is_overdue: bool,
}

pub fn system_prompt(extended: bool) -> String {
    formatdoc! {r#"
        You are an experienced systems analyst. Analyze the issue details and provide a structured analysis. Describe every dimension thoroughly and in detail.
        Your response must follow this JSON structure:
        {{
            "module_category": "string - module category",
            "symptom_category": "string - symptom category",
            "symptom_description": "string - symptom description",
            "root_cause_category": "string - root cause category",
            "root_cause_description": "string - root cause description",
            "solution_category": "string - solution category",
            "solution_description": "string - solution description",
            "is_closed": "boolean - whether the issue is closed",
            "is_fixed": "boolean - whether the issue is fixed",
            "defect_type": "string - defect type",
            "technical_debt_description": "string - technical debt description",
            "industry_solution": "string - how the industry solves this",
            "gap_analysis": "string - gap against industry-leading products"{extended_keys}
        }}"#,
        extended_keys = if extended { EXTENDED_SCHEMA } else { "" }
    }
}

pub fn analysis_user_prompt(ticket: &Ticket) -> String {
    let created = ticket
        .created_at
        .map(|ts| ts.format(PROMPT_DATE_FORMAT).to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut prompt = formatdoc! {"
        Analyze the following issue:
        Title: {title}
        Key: {key}
        Description: {description}
        Created: {created}
        ",
        title = ticket.title,
        key = ticket.key,
        description = ticket.description,
    };

    if let Some(resolved_at) = ticket.resolved_at {
        prompt.push_str(&format!(
            "Resolved: {}\n",
            resolved_at.format(PROMPT_DATE_FORMAT)
        ));
    }

    if !ticket.comments.is_empty() {
        prompt.push_str("\nComments:\n");
        for comment in &ticket.comments {
            prompt.push_str(&format!("- {}\n", comment));
        }
    }

    if !ticket.work_logs.is_empty() {
        prompt.push_str("\nWork logs:\n");
        for work_log in &ticket.work_logs {
            prompt.push_str(&format!("- {}\n", work_log));
        }
    }

    prompt
}

/// Locate the JSON object embedded in a model reply.
///
/// Tries the widest `{ ... }` span first, then every `{` in turn so prose with
/// stray braces around the object does not hide it.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, AnalysisError> {
    static RE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

    let widest = RE_OBJECT.find(raw).ok_or(AnalysisError::NoStructuredContent)?;
    if let Ok(map) = serde_json::from_str::<Map<String, Value>>(widest.as_str()) {
        return Ok(map);
    }

    raw.match_indices('{')
        .find_map(|(pos, _)| {
            serde_json::Deserializer::from_str(&raw[pos..])
                .into_iter::<Map<String, Value>>()
                .next()
                .and_then(Result::ok)
        })
        .ok_or(AnalysisError::NoStructuredContent)
}

/// Strictly decode an extracted object. Missing keys or wrong types reject the
/// whole verdict.
pub fn decode_analysis(
    object: Map<String, Value>,
    extended: bool,
) -> Result<AnalysisResult, AnalysisError> {
    let value = Value::Object(object);

    let mut result = serde_json::from_value::<AnalysisResult>(value.clone())
        .map_err(|e| AnalysisError::SchemaMismatch(e.to_string()))?;

    if extended {
        let ext = serde_json::from_value::<ExtendedAnalysis>(value)
            .map_err(|e| AnalysisError::SchemaMismatch(e.to_string()))?;
        result.extended = Some(ext);
    }

    Ok(result)
}

pub fn parse_analysis_reply(raw: &str, extended: bool) -> Result<AnalysisResult, AnalysisError> {
    let object = extract_json_object(raw)?;
    decode_analysis(object, extended)
}

/// Analyzer backed by an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct ChatAnalyzer {
    http_client: HttpClient,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: Option<f64>,
    max_tokens: u32,
    json_mode: bool,
    extended: bool,
}

impl ChatAnalyzer {
    pub fn new(http_client: HttpClient, cfg: &AiConfig) -> Self {
        ChatAnalyzer {
            http_client,
            endpoint: format!("{}/{}", cfg.base_url.trim_end_matches('/'), CHAT_PATH),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            json_mode: cfg.json_mode,
            extended: cfg.extended_fields,
        }
    }

    pub async fn send_analysis_prompt(
        &self,
        ticket: &Ticket,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage::system(system_prompt(self.extended)),
                ChatMessage::user(analysis_user_prompt(ticket)),
            ],
            response_format: self
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let resp = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::ServiceUnavailable(format!(
                "chat api returned {}: {}",
                status, body
            )));
        }

        let parsed = resp.json::<ChatApiResponseOrError>().await?;
        let parsed = match parsed {
            ChatApiResponseOrError::Response(parsed) => parsed,
            ChatApiResponseOrError::NestedError { error } | ChatApiResponseOrError::Error(error) => {
                return Err(AnalysisError::ServiceUnavailable(format!(
                    "chat api error: {}",
                    error.message
                )));
            }
        };

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                "Issue {}: prompt used {} tokens",
                ticket.key,
                usage.total_tokens
            );
        }

        let choice = parsed
            .choices
            .first()
            .ok_or(AnalysisError::NoStructuredContent)?;

        if choice.finish_reason == Some(FinishReason::Length) {
            tracing::warn!(
                "Issue {}: reply hit the {} token limit and may be truncated",
                ticket.key,
                self.max_tokens
            );
        }
        tracing::debug!("Issue {}: raw reply {}", ticket.key, choice.message.content);

        parse_analysis_reply(&choice.message.content, self.extended)
    }
}

#[async_trait]
impl IssueAnalyzer for ChatAnalyzer {
    async fn analyze(&self, ticket: &Ticket) -> Result<AnalysisResult, AnalysisError> {
        self.send_analysis_prompt(ticket).await
    }
}
