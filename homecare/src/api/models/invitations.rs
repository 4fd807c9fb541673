//! API models for care-team invitations and caregiver invitations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::profiles::Role;
use crate::{
    db::models::{
        care_team::{AccessLevel, CaregiverPermissions},
        invitations::{
            CaregiverInvitationDBResponse, CaregiverInvitationWithPatient, InvitationStatus, InvitationType, InvitationWithProfiles,
        },
    },
    types::{ClinicianId, InvitationId, PatientId, ProfileId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitationCreate {
    pub email: String,
    pub message: Option<String>,
}

/// The other side of an invitation, when they have a profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitationParty {
    pub name: String,
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: InvitationId,
    pub invitation_type: InvitationType,
    /// `expired` when a pending invitation has passed its expiry
    pub status: InvitationStatus,
    #[schema(value_type = String, format = "uuid")]
    pub inviter_id: ProfileId,
    pub invitee_email: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub invitee_id: Option<ProfileId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub patient_id: Option<PatientId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub clinician_id: Option<ClinicianId>,
    pub message: Option<String>,
    pub inviter: InvitationParty,
    pub invitee: Option<InvitationParty>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InvitationResponse {
    pub fn from_row(row: InvitationWithProfiles, now: DateTime<Utc>) -> Self {
        let invitation = row.invitation;
        let invitee = match (row.invitee_first_name, row.invitee_last_name) {
            (Some(first), Some(last)) => Some(InvitationParty {
                name: format!("{first} {last}").trim().to_string(),
                email: Some(invitation.invitee_email.clone()),
                role: row.invitee_role,
            }),
            _ => None,
        };
        Self {
            id: invitation.id,
            invitation_type: invitation.invitation_type,
            status: invitation.effective_status(now),
            inviter_id: invitation.inviter_id,
            invitee_email: invitation.invitee_email,
            invitee_id: invitation.invitee_id,
            patient_id: invitation.patient_id,
            clinician_id: invitation.clinician_id,
            message: invitation.message,
            inviter: InvitationParty {
                name: format!("{} {}", row.inviter_first_name, row.inviter_last_name).trim().to_string(),
                email: Some(row.inviter_email),
                role: Some(row.inviter_role),
            },
            invitee,
            expires_at: invitation.expires_at,
            responded_at: invitation.responded_at,
            created_at: invitation.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitationListResponse {
    pub received: Vec<InvitationResponse>,
    pub sent: Vec<InvitationResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaregiverInvitationCreate {
    pub email: String,
    /// e.g. `daughter`, `spouse`, `friend`
    pub relationship_type: String,
    #[serde(default)]
    pub is_mpoa: bool,
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(default)]
    pub permissions: CaregiverPermissions,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaregiverInvitationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: InvitationId,
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    /// Set on invitations the caller received
    pub patient_name: Option<String>,
    pub email: String,
    pub relationship_type: String,
    pub is_mpoa: bool,
    pub access_level: AccessLevel,
    pub permissions: CaregiverPermissions,
    pub message: Option<String>,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub invited_at: DateTime<Utc>,
}

impl CaregiverInvitationResponse {
    pub fn from_db(db: CaregiverInvitationDBResponse, now: DateTime<Utc>) -> Self {
        Self {
            id: db.id,
            patient_id: db.patient_id,
            patient_name: None,
            status: db.effective_status(now),
            permissions: db.permissions(),
            email: db.email,
            relationship_type: db.relationship_type,
            is_mpoa: db.is_mpoa,
            access_level: db.access_level,
            message: db.message,
            expires_at: db.expires_at,
            responded_at: db.responded_at,
            invited_at: db.invited_at,
        }
    }

    pub fn from_row(row: CaregiverInvitationWithPatient, now: DateTime<Utc>) -> Self {
        let patient_name = format!("{} {}", row.patient_first_name, row.patient_last_name).trim().to_string();
        Self {
            patient_name: Some(patient_name),
            ..Self::from_db(row.invitation, now)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaregiverInvitationListResponse {
    /// Invitations addressed to the caller's email
    pub received: Vec<CaregiverInvitationResponse>,
    /// Invitations the caller sent as a patient
    pub sent: Vec<CaregiverInvitationResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::invitations::InvitationDBResponse;
    use chrono::Duration;
    use uuid::Uuid;

    fn row(status: InvitationStatus, expires_in: Duration) -> InvitationWithProfiles {
        let now = Utc::now();
        InvitationWithProfiles {
            invitation: InvitationDBResponse {
                id: Uuid::new_v4(),
                inviter_id: Uuid::new_v4(),
                invitee_email: "clinician@example.com".to_string(),
                invitee_id: None,
                invitation_type: InvitationType::PatientToClinician,
                patient_id: Some(Uuid::new_v4()),
                clinician_id: None,
                status,
                message: None,
                expires_at: now + expires_in,
                responded_at: None,
                created_at: now,
                updated_at: now,
            },
            inviter_first_name: "Pat".to_string(),
            inviter_last_name: "Jones".to_string(),
            inviter_email: "pat@example.com".to_string(),
            inviter_role: Role::Patient,
            invitee_first_name: None,
            invitee_last_name: None,
            invitee_role: None,
        }
    }

    #[test]
    fn pending_past_expiry_reads_as_expired() {
        let response = InvitationResponse::from_row(row(InvitationStatus::Pending, Duration::hours(-1)), Utc::now());
        assert_eq!(response.status, InvitationStatus::Expired);

        let response = InvitationResponse::from_row(row(InvitationStatus::Pending, Duration::days(3)), Utc::now());
        assert_eq!(response.status, InvitationStatus::Pending);
    }

    #[test]
    fn responded_invitations_keep_their_status_after_expiry() {
        let response = InvitationResponse::from_row(row(InvitationStatus::Accepted, Duration::days(-3)), Utc::now());
        assert_eq!(response.status, InvitationStatus::Accepted);
    }

    #[test]
    fn invitee_without_profile_is_omitted() {
        let response = InvitationResponse::from_row(row(InvitationStatus::Pending, Duration::days(1)), Utc::now());
        assert!(response.invitee.is_none());
        assert_eq!(response.inviter.name, "Pat Jones");
    }
}
