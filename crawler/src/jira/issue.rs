//! Tracker issue types
//!
//! Wire types for the search endpoint plus the flattened [`Ticket`] the rest of the
//! crawler works with.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const JIRA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const CUSTOM_FIELD_PREFIX: &str = "customfield_";

/// One tracker issue, flattened for analysis
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ticket {
    pub key: String,
    pub title: String,
    pub description: String,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub resolved_at: Option<DateTime<FixedOffset>>,
    pub dev: Option<String>,
    pub qa: Option<String>,
    pub comments: Vec<String>,
    pub work_logs: Vec<String>,
    pub custom_fields: BTreeMap<String, CustomFieldValue>,
}

impl Ticket {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    pub fn joined_comments(&self) -> String {
        self.comments.join("\n")
    }

    pub fn joined_work_logs(&self) -> String {
        self.work_logs.join("\n")
    }

    pub fn from_jira_issue(issue: JiraIssue, qa_field: Option<&str>) -> Self {
        let JiraIssue { key, fields, .. } = issue;

        let created_at = timestamp_field(&key, "created", fields.created.as_ref());
        let resolved_at = timestamp_field(&key, "resolution", fields.resolutiondate.as_ref());

        let dev = fields.assignee.as_ref().and_then(JiraUser::name);
        let qa = qa_field
            .and_then(|field| fields.other.get(field))
            .and_then(user_name_from_value);

        let comments = fields
            .comment
            .map(|page| page.comments)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.body.as_ref().map(value_to_text))
            .filter(|body| !body.trim().is_empty())
            .collect();

        let work_logs = fields
            .worklog
            .map(|page| page.worklogs)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|w| w.comment.as_ref().map(value_to_text))
            .filter(|body| !body.trim().is_empty())
            .collect();

        let custom_fields = fields
            .other
            .iter()
            .filter(|(name, _)| name.starts_with(CUSTOM_FIELD_PREFIX))
            .map(|(name, value)| (name.clone(), CustomFieldValue::from(value)))
            .collect();

        Ticket {
            key,
            title: fields.summary.unwrap_or_default(),
            description: fields
                .description
                .as_ref()
                .map(value_to_text)
                .unwrap_or_default(),
            created_at,
            resolved_at,
            dev,
            qa,
            comments,
            work_logs,
            custom_fields,
        }
    }
}

/// Loosely typed custom field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomFieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&Value> for CustomFieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => CustomFieldValue::Null,
            Value::Bool(b) => CustomFieldValue::Bool(*b),
            Value::Number(n) => n
                .as_f64()
                .map(CustomFieldValue::Number)
                .unwrap_or_else(|| CustomFieldValue::Text(n.to_string())),
            Value::String(s) => CustomFieldValue::Text(s.clone()),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(value_to_text)
                    .collect();
                if parts.is_empty() {
                    CustomFieldValue::Null
                } else {
                    CustomFieldValue::Text(parts.join(", "))
                }
            }
            Value::Object(_) => CustomFieldValue::Text(value_to_text(value)),
        }
    }
}

fn timestamp_field(key: &str, name: &str, value: Option<&Value>) -> Option<DateTime<FixedOffset>> {
    let value = value.filter(|v| !v.is_null())?;
    let parsed = timestamp_from_value(value);
    if parsed.is_none() {
        tracing::debug!("Issue {}: unparseable {} timestamp {}", key, name, value);
    }
    parsed
}

/// Accepts the tracker's string format or epoch milliseconds
fn timestamp_from_value(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(raw) => parse_jira_timestamp(raw),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|ts| ts.fixed_offset()),
        _ => None,
    }
}

/// Parse the tracker's timestamp format (`2024-03-01T09:15:00.000+0800`), falling
/// back to RFC 3339. Anything else is treated as absent.
pub fn parse_jira_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DateTime::parse_from_str(raw, JIRA_TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}

/// Render a field value as plain text. Handles plain strings, option/user objects
/// and Atlassian document trees.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("doc") => {
            let mut out = String::new();
            collect_document_text(value, &mut out);
            out.trim_end().to_string()
        }
        Value::Object(map) => ["value", "name", "displayName"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn collect_document_text(node: &Value, out: &mut String) {
    if let Some(text) = node.get("text").and_then(Value::as_str) {
        out.push_str(text);
    }

    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            collect_document_text(child, out);
        }
    }

    if matches!(
        node.get("type").and_then(Value::as_str),
        Some("paragraph" | "heading" | "listItem" | "codeBlock" | "hardBreak")
    ) {
        out.push('\n');
    }
}

fn user_name_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => serde_json::from_value::<JiraUser>(value.clone())
            .ok()
            .and_then(|u| u.name()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

// -- Search endpoint wire types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub total: usize,
    #[serde(default)]
    pub issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub created: Option<Value>,
    #[serde(default)]
    pub resolutiondate: Option<Value>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
    #[serde(default)]
    pub comment: Option<CommentPage>,
    #[serde(default)]
    pub worklog: Option<WorklogPage>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl JiraUser {
    fn name(&self) -> Option<String> {
        self.display_name
            .clone()
            .or_else(|| self.name.clone())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentPage {
    #[serde(default)]
    pub comments: Vec<JiraComment>,
}

#[derive(Debug, Deserialize)]
pub struct JiraComment {
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorklogPage {
    #[serde(default)]
    pub worklogs: Vec<JiraWorklog>,
}

#[derive(Debug, Deserialize)]
pub struct JiraWorklog {
    #[serde(default)]
    pub comment: Option<Value>,
}
