//! API models for medications, dose logs and adherence.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    aggregation::Adherence,
    db::models::medications::{
        MedicationDBResponse, MedicationLogDBResponse, MedicationLogStatus, MedicationUpdateDBRequest,
    },
    types::{MedicationId, PatientId, ProfileId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MedicationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MedicationId,
    #[schema(value_type = String, format = "uuid")]
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MedicationDBResponse> for MedicationResponse {
    fn from(db: MedicationDBResponse) -> Self {
        Self {
            id: db.id,
            patient_id: db.patient_id,
            name: db.name,
            dosage: db.dosage,
            frequency: db.frequency,
            instructions: db.instructions,
            prescribing_physician: db.prescribing_physician,
            start_date: db.start_date,
            end_date: db.end_date,
            reminder_enabled: db.reminder_enabled,
            reminder_times: db.reminder_times,
            is_active: db.is_active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MedicationCreate {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub instructions: Option<String>,
    pub prescribing_physician: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub reminder_enabled: bool,
    /// `HH:MM` times of day
    #[serde(default)]
    pub reminder_times: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MedicationUpdate {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub instructions: Option<String>,
    pub prescribing_physician: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reminder_enabled: Option<bool>,
    pub reminder_times: Option<Vec<String>>,
    /// Set false to discontinue
    pub is_active: Option<bool>,
}

impl From<MedicationUpdate> for MedicationUpdateDBRequest {
    fn from(api: MedicationUpdate) -> Self {
        Self {
            name: api.name,
            dosage: api.dosage,
            frequency: api.frequency,
            instructions: api.instructions,
            prescribing_physician: api.prescribing_physician,
            start_date: api.start_date,
            end_date: api.end_date,
            reminder_enabled: api.reminder_enabled,
            reminder_times: api.reminder_times,
            is_active: api.is_active,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListMedicationsQuery {
    /// Include discontinued medications (default: false)
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MedicationLogCreate {
    pub scheduled_time: DateTime<Utc>,
    pub status: MedicationLogStatus,
    /// Defaults to now when the dose is marked taken
    pub taken_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MedicationLogResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: uuid::Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub medication_id: MedicationId,
    pub scheduled_time: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
    pub status: MedicationLogStatus,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub logged_by: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
}

impl From<MedicationLogDBResponse> for MedicationLogResponse {
    fn from(db: MedicationLogDBResponse) -> Self {
        Self {
            id: db.id,
            medication_id: db.medication_id,
            scheduled_time: db.scheduled_time,
            taken_at: db.taken_at,
            status: db.status,
            notes: db.notes,
            logged_by: db.logged_by,
            created_at: db.created_at,
        }
    }
}

/// Adherence over a trailing window of dose logs.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdherenceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    pub window_days: i64,
    #[serde(flatten)]
    pub adherence: Adherence,
}
