//! API request/response models for profiles.

use super::pagination::Pagination;
use crate::db::models::profiles::ProfileDBResponse;
use crate::errors::Error;
use crate::types::ProfileId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

/// The single role a profile holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "profile_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Caregiver,
    Clinician,
    AgencyAdmin,
    Physician,
    Vendor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Caregiver => "caregiver",
            Role::Clinician => "clinician",
            Role::AgencyAdmin => "agency_admin",
            Role::Physician => "physician",
            Role::Vendor => "vendor",
        }
    }

    /// Agency admins are provisioned by config or by another admin, never through sign-up.
    pub fn is_self_registrable(&self) -> bool {
        !matches!(self, Role::AgencyAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks the shape `local@domain.tld` with no whitespace, and returns the address lowercased.
pub fn normalize_email(email: &str) -> Result<String, Error> {
    let email = email.trim().to_lowercase();
    let invalid = || Error::BadRequest {
        message: "Please enter a valid email address".to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(email),
        _ => Err(invalid()),
    }
}

/// The authenticated caller, as carried in the session token or resolved from the proxy header.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProfileId,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

impl CurrentUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl From<ProfileDBResponse> for CurrentUser {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            role: db.role,
            first_name: db.first_name,
            last_name: db.last_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProfileId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub profile_image_url: Option<String>,
    pub auth_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileDBResponse> for ProfileResponse {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            phone: db.phone,
            role: db.role,
            date_of_birth: db.date_of_birth,
            address: db.address,
            city: db.city,
            state: db.state,
            zip_code: db.zip_code,
            profile_image_url: db.profile_image_url,
            auth_source: db.auth_source,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Name and role of the other party on a message, invitation or care-team row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ProfileSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProfileId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl ProfileSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl From<ProfileDBResponse> for ProfileSummary {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            role: db.role,
        }
    }
}

/// Partial profile update. `role` may only be changed by an agency admin.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListProfilesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on first name, last name or email
    pub search: Option<String>,

    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_use_snake_case_on_the_wire() {
        assert_eq!(serde_json::to_string(&Role::AgencyAdmin).unwrap(), "\"agency_admin\"");
        let role: Role = serde_json::from_str("\"caregiver\"").unwrap();
        assert_eq!(role, Role::Caregiver);
        assert_eq!(Role::Physician.to_string(), "physician");
    }

    #[test]
    fn agency_admin_cannot_self_register() {
        assert!(!Role::AgencyAdmin.is_self_registrable());
        assert!(Role::Vendor.is_self_registrable());
    }

    #[test]
    fn accepts_and_lowercases_plain_addresses() {
        assert_eq!(normalize_email("  Nurse.Joy@Example.COM ").unwrap(), "nurse.joy@example.com");
        assert_eq!(normalize_email("a@b.co").unwrap(), "a@b.co");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "plain", "@example.com", "a@", "a@example", "a@.com", "a@example.", "a b@example.com", "a@b@c.com"] {
            assert!(normalize_email(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn full_name_trims_missing_parts() {
        let summary = ProfileSummary {
            id: uuid::Uuid::new_v4(),
            email: "pat@example.com".to_string(),
            first_name: "Pat".to_string(),
            last_name: String::new(),
            role: Role::Patient,
        };
        assert_eq!(summary.full_name(), "Pat");
    }
}
