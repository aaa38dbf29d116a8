//! `SeaORM` Entity for one analyzed tracker issue

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "analyzed_issue")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "Text")]
    pub jira_url: String,
    #[sea_orm(column_type = "String(StringLen::N(191))", unique)]
    pub jira_key: String,
    #[sea_orm(column_type = "String(StringLen::N(256))", nullable)]
    pub issue_title: Option<String>,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "String(StringLen::N(191))", nullable)]
    pub responsible_dev: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(191))", nullable)]
    pub responsible_qa: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(191))", nullable)]
    pub module_category: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(191))", nullable)]
    pub symptom_category: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub symptom_description: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(191))", nullable)]
    pub root_cause_category: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub root_cause_description: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(191))", nullable)]
    pub solution_category: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub solution_description: Option<String>,
    pub is_closed: bool,
    pub is_fixed: bool,
    #[sea_orm(column_type = "String(StringLen::N(191))", nullable)]
    pub defect_type: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub technical_debt_description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub industry_solution: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub gap_analysis: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(64))", nullable)]
    pub sla_level: Option<String>,
    pub is_overdue: Option<bool>,
    #[sea_orm(column_type = "Text", nullable)]
    pub original_description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub original_comments: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub original_work_logs: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub custom_fields: Option<Json>,
    pub analyzed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
