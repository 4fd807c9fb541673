//! Database repository for password reset tokens.

use chrono::Utc;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::password::{self, Argon2Params},
    config::Config,
    db::{
        errors::{DbError, Result},
        models::password_reset_tokens::{PasswordResetTokenCreateDBRequest, PasswordResetTokenDBResponse},
    },
    types::{ProfileId, abbrev_uuid},
};

pub struct PasswordResetTokens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PasswordResetTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&request.profile_id)), err)]
    pub async fn create(&mut self, request: &PasswordResetTokenCreateDBRequest) -> Result<PasswordResetTokenDBResponse> {
        let token_hash =
            password::hash_string_with_params(&request.raw_token, Some(request.argon2_params)).map_err(|e| DbError::Other(anyhow::anyhow!(e)))?;

        let token = sqlx::query_as::<_, PasswordResetTokenDBResponse>(
            r#"
            INSERT INTO password_reset_tokens (profile_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.profile_id)
        .bind(token_hash)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(token)
    }

    /// Issue a fresh token for `profile_id`. Returns the raw token for the emailed link
    /// alongside the stored row.
    #[instrument(skip(self, config), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn create_for_profile(&mut self, profile_id: ProfileId, config: &Config) -> Result<(String, PasswordResetTokenDBResponse)> {
        let raw_token = password::generate_reset_token();
        let expires_at = Utc::now()
            + chrono::Duration::from_std(config.auth.native.password_reset_token_duration).unwrap_or(chrono::Duration::minutes(30));

        let request = PasswordResetTokenCreateDBRequest {
            profile_id,
            raw_token: raw_token.clone(),
            expires_at,
            argon2_params: Argon2Params::from(&config.auth.native.password),
        };

        let token = self.create(&request).await?;
        Ok((raw_token, token))
    }

    /// The token row if it exists, is unused, unexpired and matches `raw_token`.
    #[instrument(skip(self, raw_token), fields(token_id = %abbrev_uuid(&token_id)), err)]
    pub async fn find_valid_token(&mut self, token_id: Uuid, raw_token: &str) -> Result<Option<PasswordResetTokenDBResponse>> {
        let token = sqlx::query_as::<_, PasswordResetTokenDBResponse>("SELECT * FROM password_reset_tokens WHERE id = $1")
            .bind(token_id)
            .fetch_optional(&mut *self.db)
            .await?;

        let Some(token) = token.filter(|t| t.is_usable(Utc::now())) else {
            return Ok(None);
        };

        match password::verify_string(raw_token, &token.token_hash) {
            Ok(true) => Ok(Some(token)),
            Ok(false) => Ok(None),
            Err(e) => {
                tracing::error!("Token verification error for token {}: {:?}", token_id, e);
                Ok(None)
            }
        }
    }

    /// Mark every outstanding token for the profile as used.
    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn invalidate_for_profile(&mut self, profile_id: ProfileId) -> Result<u64> {
        let result = sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE profile_id = $1 AND used_at IS NULL")
            .bind(profile_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::profiles::Role,
        test_utils::{create_test_config, create_test_user},
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn issued_token_verifies_once(pool: PgPool) {
        let profile = create_test_user(&pool, Role::Patient).await;
        let config = create_test_config();
        let mut conn = pool.acquire().await.unwrap();
        let mut tokens = PasswordResetTokens::new(&mut conn);

        let (raw, token) = tokens.create_for_profile(profile.id, &config).await.unwrap();
        assert!(tokens.find_valid_token(token.id, &raw).await.unwrap().is_some());
        assert!(tokens.find_valid_token(token.id, "not-the-token").await.unwrap().is_none());

        assert_eq!(tokens.invalidate_for_profile(profile.id).await.unwrap(), 1);
        assert!(tokens.find_valid_token(token.id, &raw).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn expired_token_is_rejected(pool: PgPool) {
        let profile = create_test_user(&pool, Role::Caregiver).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut tokens = PasswordResetTokens::new(&mut conn);

        let token = tokens
            .create(&PasswordResetTokenCreateDBRequest {
                profile_id: profile.id,
                raw_token: "raw".to_string(),
                expires_at: Utc::now() - chrono::Duration::minutes(1),
                argon2_params: Argon2Params::default(),
            })
            .await
            .unwrap();
        assert!(tokens.find_valid_token(token.id, "raw").await.unwrap().is_none());
    }
}
