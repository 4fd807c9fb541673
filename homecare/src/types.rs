//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (ProfileId, PatientId, etc.)
//! - Permission and authorization types used in 403 responses
//! - Resource and operation enums for access control
//!
//! # Operations
//!
//! Operations come in two flavors:
//! - **All**: Unrestricted access to all entities (e.g., `ReadAll`), held by agency admins
//! - **Own**: Restricted to entities the caller owns or is linked to through an active care
//!   relationship (e.g., `ReadOwn`)

use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

pub type ProfileId = Uuid;
pub type PatientId = Uuid;
pub type ClinicianId = Uuid;
pub type CaregiverId = Uuid;
pub type PhysicianId = Uuid;
pub type VendorId = Uuid;
pub type VisitId = Uuid;
pub type MedicationId = Uuid;
pub type CarePlanId = Uuid;
pub type GoalId = Uuid;
pub type MessageId = Uuid;
pub type NotificationId = Uuid;
pub type DocumentId = Uuid;
pub type InvitationId = Uuid;
pub type AlertId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub enum CurrentKeyword {
    #[serde(rename = "current")]
    Current,
}

/// Lets `/profiles/current` and `/profiles/{id}` share one handler.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProfileIdOrCurrent {
    Current(CurrentKeyword),
    Id(ProfileId),
}

// *-All means unrestricted access, *-Own means restricted to own or linked records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Profiles,
    Patients,
    CareTeam,
    Visits,
    VisitRatings,
    Medications,
    CarePlans,
    Messages,
    Notifications,
    Documents,
    Invitations,
    CaregiverInvitations,
    Alerts,
    Analytics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Caller must hold an active care relationship with the patient
    Granted,
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_id_or_current_parses_both_forms() {
        let current: ProfileIdOrCurrent = serde_json::from_str("\"current\"").unwrap();
        assert!(matches!(current, ProfileIdOrCurrent::Current(_)));

        let id = Uuid::new_v4();
        let parsed: ProfileIdOrCurrent = serde_json::from_str(&format!("\"{id}\"")).unwrap();
        assert!(matches!(parsed, ProfileIdOrCurrent::Id(p) if p == id));
    }

    #[test]
    fn abbrev_uuid_keeps_first_eight_chars() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
