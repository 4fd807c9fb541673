//! Database models for care-team invitations (patient <-> clinician) and caregiver invitations.
//!
//! Both share [`InvitationStatus`]. Only `pending` ever changes; the four other states are
//! terminal. Nothing marks rows `expired` in storage. A pending invitation past `expires_at` is
//! reported as expired on read and can no longer be answered.

use crate::{
    api::models::profiles::Role,
    db::models::care_team::{AccessLevel, CaregiverPermissions},
    types::{ClinicianId, InvitationId, PatientId, ProfileId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "invitation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Cancelled,
}

impl InvitationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }

    /// Only `pending` moves, and only to a terminal state. The repository's `respond` and
    /// `cancel` updates repeat this as `WHERE status = 'pending'` so concurrent answers can't race.
    pub fn can_transition_to(&self, next: InvitationStatus) -> bool {
        matches!(self, InvitationStatus::Pending) && next.is_terminal()
    }

    /// The status a reader should see: pending rows past their expiry read as expired.
    pub fn effective(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> InvitationStatus {
        match self {
            InvitationStatus::Pending if expires_at <= now => InvitationStatus::Expired,
            other => *other,
        }
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "invitation_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvitationType {
    PatientToClinician,
    ClinicianToPatient,
}

impl InvitationType {
    /// The invitation type a role sends, if it can send any.
    pub fn sent_by(role: Role) -> Option<InvitationType> {
        match role {
            Role::Patient => Some(InvitationType::PatientToClinician),
            Role::Clinician => Some(InvitationType::ClinicianToPatient),
            _ => None,
        }
    }

    pub fn invitee_role(&self) -> Role {
        match self {
            InvitationType::PatientToClinician => Role::Clinician,
            InvitationType::ClinicianToPatient => Role::Patient,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvitationCreateDBRequest {
    pub inviter_id: ProfileId,
    pub invitee_email: String,
    pub invitee_id: Option<ProfileId>,
    pub invitation_type: InvitationType,
    pub patient_id: Option<PatientId>,
    pub clinician_id: Option<ClinicianId>,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InvitationDBResponse {
    pub id: InvitationId,
    pub inviter_id: ProfileId,
    pub invitee_email: String,
    pub invitee_id: Option<ProfileId>,
    pub invitation_type: InvitationType,
    pub patient_id: Option<PatientId>,
    pub clinician_id: Option<ClinicianId>,
    pub status: InvitationStatus,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvitationDBResponse {
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        self.status.effective(self.expires_at, now)
    }

    /// Whether `profile` (id and email) is the addressee.
    pub fn is_addressed_to(&self, profile_id: ProfileId, email: &str) -> bool {
        self.invitee_id == Some(profile_id) || self.invitee_email.eq_ignore_ascii_case(email)
    }
}

/// An invitation with the inviter's and, when known, the invitee's profile.
#[derive(Debug, Clone, FromRow)]
pub struct InvitationWithProfiles {
    #[sqlx(flatten)]
    pub invitation: InvitationDBResponse,
    pub inviter_first_name: String,
    pub inviter_last_name: String,
    pub inviter_email: String,
    pub inviter_role: Role,
    pub invitee_first_name: Option<String>,
    pub invitee_last_name: Option<String>,
    pub invitee_role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct CaregiverInvitationCreateDBRequest {
    pub patient_id: PatientId,
    pub email: String,
    pub relationship_type: String,
    pub is_mpoa: bool,
    pub access_level: AccessLevel,
    pub permissions: CaregiverPermissions,
    pub message: Option<String>,
    pub invited_by: ProfileId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CaregiverInvitationDBResponse {
    pub id: InvitationId,
    pub patient_id: PatientId,
    pub email: String,
    pub relationship_type: String,
    pub is_mpoa: bool,
    pub access_level: AccessLevel,
    pub can_view_records: bool,
    pub can_message: bool,
    pub can_schedule: bool,
    pub can_manage_medications: bool,
    pub message: Option<String>,
    pub invited_by: ProfileId,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub invited_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CaregiverInvitationDBResponse {
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        self.status.effective(self.expires_at, now)
    }

    pub fn permissions(&self) -> CaregiverPermissions {
        CaregiverPermissions {
            can_view_records: self.can_view_records,
            can_message: self.can_message,
            can_schedule: self.can_schedule,
            can_manage_medications: self.can_manage_medications,
        }
    }
}

/// A caregiver invitation with the inviting patient's name.
#[derive(Debug, Clone, FromRow)]
pub struct CaregiverInvitationWithPatient {
    #[sqlx(flatten)]
    pub invitation: CaregiverInvitationDBResponse,
    pub patient_first_name: String,
    pub patient_last_name: String,
}
