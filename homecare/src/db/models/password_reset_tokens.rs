//! Database models for password reset tokens.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{auth::password::Argon2Params, types::ProfileId};

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetTokenDBResponse {
    pub id: Uuid,
    pub profile_id: ProfileId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetTokenDBResponse {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now <= self.expires_at
    }
}

/// The raw token is hashed before it is stored and never persisted.
#[derive(Debug, Clone)]
pub struct PasswordResetTokenCreateDBRequest {
    pub profile_id: ProfileId,
    pub raw_token: String,
    pub expires_at: DateTime<Utc>,
    pub argon2_params: Argon2Params,
}
