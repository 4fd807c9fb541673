//! Database models for profiles.

use crate::api::models::profiles::{ProfileUpdate, Role};
use crate::types::ProfileId;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct ProfileCreateDBRequest {
    /// Stored lowercased; the table rejects anything else.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub password_hash: Option<String>,
    pub auth_source: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateDBRequest {
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
    pub password_hash: Option<String>,
}

impl From<ProfileUpdate> for ProfileUpdateDBRequest {
    fn from(api: ProfileUpdate) -> Self {
        Self {
            first_name: api.first_name,
            last_name: api.last_name,
            phone: api.phone,
            date_of_birth: api.date_of_birth,
            address: api.address,
            city: api.city,
            state: api.state,
            zip_code: api.zip_code,
            profile_image_url: api.profile_image_url,
            role: api.role,
            password_hash: None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileDBResponse {
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
    pub password_hash: Option<String>,
    pub auth_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileDBResponse {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}
