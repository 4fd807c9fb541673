//! Database models for the administrative audit trail.

use crate::types::ProfileId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Mutations administrators care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    InvitationAccepted,
    InvitationDeclined,
    InvitationCancelled,
    CaregiverInvitationAccepted,
    CaregiverInvitationDeclined,
    CaregiverInvitationCancelled,
    AlertResolved,
    ClinicianRevoked,
    CaregiverRevoked,
    ProfileRoleChanged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::InvitationAccepted => "invitation.accepted",
            AuditAction::InvitationDeclined => "invitation.declined",
            AuditAction::InvitationCancelled => "invitation.cancelled",
            AuditAction::CaregiverInvitationAccepted => "caregiver_invitation.accepted",
            AuditAction::CaregiverInvitationDeclined => "caregiver_invitation.declined",
            AuditAction::CaregiverInvitationCancelled => "caregiver_invitation.cancelled",
            AuditAction::AlertResolved => "alert.resolved",
            AuditAction::ClinicianRevoked => "care_team.clinician_revoked",
            AuditAction::CaregiverRevoked => "care_team.caregiver_revoked",
            AuditAction::ProfileRoleChanged => "profile.role_changed",
        }
    }

    /// The table the affected row lives in.
    pub fn entity_type(&self) -> &'static str {
        match self {
            AuditAction::InvitationAccepted | AuditAction::InvitationDeclined | AuditAction::InvitationCancelled => "invitations",
            AuditAction::CaregiverInvitationAccepted
            | AuditAction::CaregiverInvitationDeclined
            | AuditAction::CaregiverInvitationCancelled => "caregiver_invitations",
            AuditAction::AlertResolved => "patient_alerts",
            AuditAction::ClinicianRevoked => "patient_clinicians",
            AuditAction::CaregiverRevoked => "patient_caregivers",
            AuditAction::ProfileRoleChanged => "profiles",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AuditLogCreateDBRequest {
    pub actor_id: Option<ProfileId>,
    pub action: AuditAction,
    pub entity_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
}

impl AuditLogCreateDBRequest {
    pub fn new(actor_id: ProfileId, action: AuditAction, entity_id: Uuid) -> Self {
        Self {
            actor_id: Some(actor_id),
            action,
            entity_id: Some(entity_id),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditLogDBResponse {
    pub id: Uuid,
    pub actor_id: Option<ProfileId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// An audit row with the acting profile's name, when the actor still exists.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogWithActor {
    #[sqlx(flatten)]
    pub log: AuditLogDBResponse,
    pub actor_first_name: Option<String>,
    pub actor_last_name: Option<String>,
}
