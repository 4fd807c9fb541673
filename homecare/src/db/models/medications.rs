//! Database models for medications and medication logs.

use crate::types::{MedicationId, PatientId, ProfileId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "medication_log_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MedicationLogStatus {
    Taken,
    Missed,
    Pending,
}

#[derive(Debug, Clone)]
pub struct MedicationCreateDBRequest {
    pub patient_id: PatientId,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub instructions: Option<String>,
    pub prescribing_physician: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reminder_enabled: bool,
    pub reminder_times: Vec<String>,
    pub created_by: ProfileId,
}

#[derive(Debug, Clone, Default)]
pub struct MedicationUpdateDBRequest {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub instructions: Option<String>,
    pub prescribing_physician: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reminder_enabled: Option<bool>,
    pub reminder_times: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MedicationDBResponse {
    pub id: MedicationId,
    pub patient_id: PatientId,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub instructions: Option<String>,
    pub prescribing_physician: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reminder_enabled: bool,
    pub reminder_times: Vec<String>,
    pub is_active: bool,
    pub created_by: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MedicationLogCreateDBRequest {
    pub medication_id: MedicationId,
    pub patient_id: PatientId,
    pub scheduled_time: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
    pub status: MedicationLogStatus,
    pub notes: Option<String>,
    pub logged_by: ProfileId,
}

#[derive(Debug, Clone, FromRow)]
pub struct MedicationLogDBResponse {
    pub id: Uuid,
    pub medication_id: MedicationId,
    pub patient_id: PatientId,
    pub scheduled_time: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
    pub status: MedicationLogStatus,
    pub notes: Option<String>,
    pub logged_by: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
}
