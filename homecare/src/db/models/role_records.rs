//! Database models for the role records linked 1:1 to a profile.

use crate::types::{CaregiverId, ClinicianId, PatientId, PhysicianId, ProfileId, VendorId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "patient_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Active,
    Discharged,
    Inactive,
}

#[derive(Debug, Clone, FromRow)]
pub struct PatientDBResponse {
    pub id: PatientId,
    pub profile_id: ProfileId,
    pub medical_record_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub primary_diagnosis: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
    pub status: PatientStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A patient row joined with the identifying fields of its profile.
#[derive(Debug, Clone, FromRow)]
pub struct PatientDetail {
    #[sqlx(flatten)]
    pub patient: PatientDBResponse,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

impl PatientDetail {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ClinicianDBResponse {
    pub id: ClinicianId,
    pub profile_id: ProfileId,
    pub specialization: String,
    pub license_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CaregiverDBResponse {
    pub id: CaregiverId,
    pub profile_id: ProfileId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PhysicianDBResponse {
    pub id: PhysicianId,
    pub profile_id: ProfileId,
    pub specialty: Option<String>,
    pub npi_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct VendorDBResponse {
    pub id: VendorId,
    pub profile_id: ProfileId,
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
