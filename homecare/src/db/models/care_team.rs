//! Database models for patient <-> clinician and patient <-> caregiver links.
//!
//! A link is active while `revoked_at` is NULL. Revocation is a soft delete: the row stays for
//! the audit trail and a later re-link inserts a fresh row.

use crate::types::{CaregiverId, ClinicianId, PatientId, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "clinician_relationship", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClinicianRelationship {
    Primary,
    Assigned,
    Consulting,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default, ToSchema)]
#[sqlx(type_name = "access_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    View,
    Standard,
    Full,
}

#[derive(Debug, Clone)]
pub struct ClinicianLinkCreateDBRequest {
    pub patient_id: PatientId,
    pub clinician_id: ClinicianId,
    pub relationship_type: ClinicianRelationship,
    pub access_level: AccessLevel,
    pub assigned_by: Option<ProfileId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PatientClinicianDBResponse {
    pub id: Uuid,
    pub patient_id: PatientId,
    pub clinician_id: ClinicianId,
    pub relationship_type: ClinicianRelationship,
    pub access_level: AccessLevel,
    pub can_view_records: bool,
    pub can_message: bool,
    pub can_schedule: bool,
    pub can_document: bool,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<ProfileId>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Permission flags granted to a caregiver, shared by links and caregiver invitations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct CaregiverPermissions {
    pub can_view_records: bool,
    pub can_message: bool,
    pub can_schedule: bool,
    pub can_manage_medications: bool,
}

impl Default for CaregiverPermissions {
    fn default() -> Self {
        Self {
            can_view_records: true,
            can_message: true,
            can_schedule: false,
            can_manage_medications: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaregiverLinkCreateDBRequest {
    pub patient_id: PatientId,
    pub caregiver_id: CaregiverId,
    pub relationship_type: String,
    pub is_mpoa: bool,
    pub access_level: AccessLevel,
    pub permissions: CaregiverPermissions,
}

#[derive(Debug, Clone, FromRow)]
pub struct PatientCaregiverDBResponse {
    pub id: Uuid,
    pub patient_id: PatientId,
    pub caregiver_id: CaregiverId,
    pub relationship_type: String,
    pub is_mpoa: bool,
    pub access_level: AccessLevel,
    pub can_view_records: bool,
    pub can_message: bool,
    pub can_schedule: bool,
    pub can_manage_medications: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An active clinician on a patient's care team, with profile details.
#[derive(Debug, Clone, FromRow)]
pub struct ClinicianMember {
    pub clinician_id: ClinicianId,
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

/// An active caregiver on a patient's care team, with profile details.
#[derive(Debug, Clone, FromRow)]
pub struct CaregiverMember {
    pub caregiver_id: CaregiverId,
    pub profile_id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub relationship_type: String,
    pub is_mpoa: bool,
    pub access_level: AccessLevel,
    pub can_view_records: bool,
    pub can_message: bool,
    pub can_schedule: bool,
    pub can_manage_medications: bool,
}
