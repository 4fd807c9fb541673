//! Database models for care plans and their goals.

use crate::types::{CarePlanId, GoalId, PatientId, ProfileId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default, ToSchema)]
#[sqlx(type_name = "care_plan_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CarePlanStatus {
    Draft,
    #[default]
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default, ToSchema)]
#[sqlx(type_name = "goal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone)]
pub struct CarePlanCreateDBRequest {
    pub patient_id: PatientId,
    pub title: String,
    pub description: Option<String>,
    pub status: CarePlanStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: ProfileId,
}

#[derive(Debug, Clone, FromRow)]
pub struct CarePlanDBResponse {
    pub id: CarePlanId,
    pub patient_id: PatientId,
    pub title: String,
    pub description: Option<String>,
    pub status: CarePlanStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GoalCreateDBRequest {
    pub care_plan_id: CarePlanId,
    pub description: String,
    pub target_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalUpdateDBRequest {
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub status: Option<GoalStatus>,
    pub progress: Option<i16>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GoalDBResponse {
    pub id: GoalId,
    pub care_plan_id: CarePlanId,
    pub description: String,
    pub target_date: Option<NaiveDate>,
    pub status: GoalStatus,
    pub progress: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
