//! API models for patients and their care teams.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::pagination::Pagination;
use crate::{
    db::models::{
        care_team::{AccessLevel, CaregiverMember, CaregiverPermissions, ClinicianMember, ClinicianRelationship},
        role_records::{PatientDetail, PatientStatus},
    },
    types::{CaregiverId, ClinicianId, PatientId, ProfileId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatientResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PatientId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
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
}

impl From<PatientDetail> for PatientResponse {
    fn from(detail: PatientDetail) -> Self {
        let patient = detail.patient;
        Self {
            id: patient.id,
            profile_id: patient.profile_id,
            first_name: detail.first_name,
            last_name: detail.last_name,
            email: detail.email,
            phone: detail.phone,
            date_of_birth: detail.date_of_birth,
            address: detail.address,
            city: detail.city,
            state: detail.state,
            zip_code: detail.zip_code,
            medical_record_number: patient.medical_record_number,
            emergency_contact_name: patient.emergency_contact_name,
            emergency_contact_phone: patient.emergency_contact_phone,
            emergency_contact_relationship: patient.emergency_contact_relationship,
            insurance_provider: patient.insurance_provider,
            insurance_policy_number: patient.insurance_policy_number,
            primary_diagnosis: patient.primary_diagnosis,
            admission_date: patient.admission_date,
            discharge_date: patient.discharge_date,
            status: patient.status,
            created_at: patient.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListPatientsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClinicianMemberResponse {
    #[schema(value_type = String, format = "uuid")]
    pub clinician_id: ClinicianId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub relationship_type: ClinicianRelationship,
    pub access_level: AccessLevel,
    pub assigned_at: DateTime<Utc>,
}

impl From<ClinicianMember> for ClinicianMemberResponse {
    fn from(m: ClinicianMember) -> Self {
        Self {
            clinician_id: m.clinician_id,
            profile_id: m.profile_id,
            first_name: m.first_name,
            last_name: m.last_name,
            email: m.email,
            phone: m.phone,
            specialization: m.specialization,
            relationship_type: m.relationship_type,
            access_level: m.access_level,
            assigned_at: m.assigned_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaregiverMemberResponse {
    #[schema(value_type = String, format = "uuid")]
    pub caregiver_id: CaregiverId,
    #[schema(value_type = String, format = "uuid")]
    pub profile_id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub relationship_type: String,
    pub is_mpoa: bool,
    pub access_level: AccessLevel,
    pub permissions: CaregiverPermissions,
}

impl From<CaregiverMember> for CaregiverMemberResponse {
    fn from(m: CaregiverMember) -> Self {
        Self {
            caregiver_id: m.caregiver_id,
            profile_id: m.profile_id,
            first_name: m.first_name,
            last_name: m.last_name,
            email: m.email,
            phone: m.phone,
            relationship_type: m.relationship_type,
            is_mpoa: m.is_mpoa,
            access_level: m.access_level,
            permissions: CaregiverPermissions {
                can_view_records: m.can_view_records,
                can_message: m.can_message,
                can_schedule: m.can_schedule,
                can_manage_medications: m.can_manage_medications,
            },
        }
    }
}

/// Active clinicians and caregivers linked to a patient.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CareTeamResponse {
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    pub clinicians: Vec<ClinicianMemberResponse>,
    pub caregivers: Vec<CaregiverMemberResponse>,
}
