use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{sea_query::OnConflict, Iterable, PaginatorTrait};

use crate::{
    db_core::prelude::*,
    error::AppResult,
    jira::Ticket,
    prompt::AnalysisResult,
};

/// One persisted verdict, keyed by the tracker key
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub jira_url: String,
    pub jira_key: String,
    pub issue_title: Option<String>,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub resolved_at: Option<DateTime<FixedOffset>>,
    pub responsible_dev: Option<String>,
    pub responsible_qa: Option<String>,
    pub module_category: Option<String>,
    pub symptom_category: Option<String>,
    pub symptom_description: Option<String>,
    pub root_cause_category: Option<String>,
    pub root_cause_description: Option<String>,
    pub solution_category: Option<String>,
    pub solution_description: Option<String>,
    pub is_closed: bool,
    pub is_fixed: bool,
    pub defect_type: Option<String>,
    pub technical_debt_description: Option<String>,
    pub industry_solution: Option<String>,
    pub gap_analysis: Option<String>,
    pub sla_level: Option<String>,
    pub is_overdue: Option<bool>,
    pub original_description: Option<String>,
    pub original_comments: Option<String>,
    pub original_work_logs: Option<String>,
    pub custom_fields: Option<serde_json::Value>,
    pub analyzed_at: DateTime<FixedOffset>,
}

impl StoredRecord {
    pub fn from_analysis(ticket: &Ticket, analysis: &AnalysisResult, jira_url: String) -> Self {
        let custom_fields = if ticket.custom_fields.is_empty() {
            None
        } else {
            serde_json::to_value(&ticket.custom_fields).ok()
        };
        let extended = analysis.extended.as_ref();

        StoredRecord {
            jira_url,
            jira_key: ticket.key.clone(),
            issue_title: Some(ticket.title.clone()),
            created_at: ticket.created_at,
            resolved_at: ticket.resolved_at,
            responsible_dev: ticket.dev.clone(),
            responsible_qa: ticket.qa.clone(),
            module_category: Some(analysis.module_category.clone()),
            symptom_category: Some(analysis.symptom_category.clone()),
            symptom_description: Some(analysis.symptom_description.clone()),
            root_cause_category: Some(analysis.root_cause_category.clone()),
            root_cause_description: Some(analysis.root_cause_description.clone()),
            solution_category: Some(analysis.solution_category.clone()),
            solution_description: Some(analysis.solution_description.clone()),
            is_closed: analysis.is_closed,
            is_fixed: analysis.is_fixed,
            defect_type: Some(analysis.defect_type.clone()),
            technical_debt_description: Some(analysis.technical_debt_description.clone()),
            industry_solution: Some(analysis.industry_solution.clone()),
            gap_analysis: Some(analysis.gap_analysis.clone()),
            sla_level: extended.map(|e| e.sla_level.clone()),
            is_overdue: extended.map(|e| e.is_overdue),
            original_description: Some(ticket.description.clone()),
            original_comments: Some(ticket.joined_comments()),
            original_work_logs: Some(ticket.joined_work_logs()),
            custom_fields,
            analyzed_at: Utc::now().into(),
        }
    }

    pub fn build_active_model(&self) -> analyzed_issue::ActiveModel {
        analyzed_issue::ActiveModel {
            id: ActiveValue::NotSet,
            jira_url: ActiveValue::Set(self.jira_url.clone()),
            jira_key: ActiveValue::Set(self.jira_key.clone()),
            issue_title: ActiveValue::Set(self.issue_title.clone()),
            created_at: ActiveValue::Set(self.created_at),
            resolved_at: ActiveValue::Set(self.resolved_at),
            responsible_dev: ActiveValue::Set(self.responsible_dev.clone()),
            responsible_qa: ActiveValue::Set(self.responsible_qa.clone()),
            module_category: ActiveValue::Set(self.module_category.clone()),
            symptom_category: ActiveValue::Set(self.symptom_category.clone()),
            symptom_description: ActiveValue::Set(self.symptom_description.clone()),
            root_cause_category: ActiveValue::Set(self.root_cause_category.clone()),
            root_cause_description: ActiveValue::Set(self.root_cause_description.clone()),
            solution_category: ActiveValue::Set(self.solution_category.clone()),
            solution_description: ActiveValue::Set(self.solution_description.clone()),
            is_closed: ActiveValue::Set(self.is_closed),
            is_fixed: ActiveValue::Set(self.is_fixed),
            defect_type: ActiveValue::Set(self.defect_type.clone()),
            technical_debt_description: ActiveValue::Set(self.technical_debt_description.clone()),
            industry_solution: ActiveValue::Set(self.industry_solution.clone()),
            gap_analysis: ActiveValue::Set(self.gap_analysis.clone()),
            sla_level: ActiveValue::Set(self.sla_level.clone()),
            is_overdue: ActiveValue::Set(self.is_overdue),
            original_description: ActiveValue::Set(self.original_description.clone()),
            original_comments: ActiveValue::Set(self.original_comments.clone()),
            original_work_logs: ActiveValue::Set(self.original_work_logs.clone()),
            custom_fields: ActiveValue::Set(self.custom_fields.clone()),
            analyzed_at: ActiveValue::Set(self.analyzed_at),
        }
    }
}

impl From<analyzed_issue::Model> for StoredRecord {
    fn from(model: analyzed_issue::Model) -> Self {
        StoredRecord {
            jira_url: model.jira_url,
            jira_key: model.jira_key,
            issue_title: model.issue_title,
            created_at: model.created_at,
            resolved_at: model.resolved_at,
            responsible_dev: model.responsible_dev,
            responsible_qa: model.responsible_qa,
            module_category: model.module_category,
            symptom_category: model.symptom_category,
            symptom_description: model.symptom_description,
            root_cause_category: model.root_cause_category,
            root_cause_description: model.root_cause_description,
            solution_category: model.solution_category,
            solution_description: model.solution_description,
            is_closed: model.is_closed,
            is_fixed: model.is_fixed,
            defect_type: model.defect_type,
            technical_debt_description: model.technical_debt_description,
            industry_solution: model.industry_solution,
            gap_analysis: model.gap_analysis,
            sla_level: model.sla_level,
            is_overdue: model.is_overdue,
            original_description: model.original_description,
            original_comments: model.original_comments,
            original_work_logs: model.original_work_logs,
            custom_fields: model.custom_fields,
            analyzed_at: model.analyzed_at,
        }
    }
}

pub struct AnalyzedIssueCtrl;

impl AnalyzedIssueCtrl {
    pub async fn find_by_key(
        conn: &DatabaseConnection,
        jira_key: &str,
    ) -> Result<Option<analyzed_issue::Model>, DbErr> {
        AnalyzedIssue::find()
            .filter(analyzed_issue::Column::JiraKey.eq(jira_key))
            .one(conn)
            .await
    }

    /// Insert, or replace every column of the row holding the same key
    pub async fn upsert(conn: &DatabaseConnection, record: &StoredRecord) -> Result<(), DbErr> {
        let replaced = analyzed_issue::Column::iter().filter(|c| {
            !matches!(
                c,
                analyzed_issue::Column::Id | analyzed_issue::Column::JiraKey
            )
        });

        AnalyzedIssue::insert(record.build_active_model())
            .on_conflict(
                OnConflict::column(analyzed_issue::Column::JiraKey)
                    .update_columns(replaced)
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(())
    }

    pub async fn count(conn: &DatabaseConnection) -> AppResult<u64> {
        let count = AnalyzedIssue::find().count(conn).await?;
        Ok(count)
    }
}

/// Keyed lookup and full-replace upsert of verdicts
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn find_by_key(&self, key: &str) -> Result<Option<StoredRecord>, DbErr>;
    async fn upsert(&self, record: &StoredRecord) -> Result<(), DbErr>;
}

#[derive(Clone)]
pub struct DbResultStore {
    conn: DatabaseConnection,
}

impl DbResultStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ResultStore for DbResultStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<StoredRecord>, DbErr> {
        let found = AnalyzedIssueCtrl::find_by_key(&self.conn, key).await?;
        Ok(found.map(StoredRecord::from))
    }

    async fn upsert(&self, record: &StoredRecord) -> Result<(), DbErr> {
        AnalyzedIssueCtrl::upsert(&self.conn, record).await
    }
}
