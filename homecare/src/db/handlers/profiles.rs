//! Database repository for profiles.

use std::collections::HashMap;

use crate::types::{ProfileId, abbrev_uuid};
use crate::{
    api::models::profiles::Role,
    db::{
        errors::{DbError, Result},
        handlers::{RoleRecords, repository::Repository},
        models::profiles::{ProfileCreateDBRequest, ProfileDBResponse, ProfileUpdateDBRequest},
    },
};
use sqlx::{Connection, PgConnection, QueryBuilder};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub role: Option<Role>,
}

impl ProfileFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions<'a>(&'a self, query: &mut QueryBuilder<'a, sqlx::Postgres>) {
        if let Some(role) = self.role {
            query.push(" AND role = ");
            query.push_bind(role);
        }
        if let Some(search) = &self.search {
            let pattern = format!("%{}%", search.to_lowercase());
            query.push(" AND (LOWER(first_name) LIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR LOWER(last_name) LIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR email LIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }
}

pub struct Profiles<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Profiles<'c> {
    type CreateRequest = ProfileCreateDBRequest;
    type UpdateRequest = ProfileUpdateDBRequest;
    type Response = ProfileDBResponse;
    type Id = ProfileId;
    type Filter = ProfileFilter;

    /// Inserts the profile together with the role record its role needs, atomically.
    #[instrument(skip(self, request), fields(email = %request.email, role = %request.role), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            r#"
            INSERT INTO profiles (email, first_name, last_name, phone, role, password_hash, auth_source)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.email.trim().to_lowercase())
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.phone)
        .bind(request.role)
        .bind(&request.password_hash)
        .bind(&request.auth_source)
        .fetch_one(&mut *tx)
        .await?;

        RoleRecords::new(&mut tx).ensure_for_profile(profile.id, profile.role).await?;

        tx.commit().await?;
        Ok(profile)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(profile)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let profiles = sqlx::query_as::<_, ProfileDBResponse>("SELECT * FROM profiles WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(profiles.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM profiles WHERE 1=1");
        filter.push_conditions(&mut query);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let profiles = query.build_query_as::<ProfileDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(profiles)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// A role change also provisions the role record for the new role.
    #[instrument(skip(self, request), fields(profile_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            r#"
            UPDATE profiles SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                date_of_birth = COALESCE($5, date_of_birth),
                address = COALESCE($6, address),
                city = COALESCE($7, city),
                state = COALESCE($8, state),
                zip_code = COALESCE($9, zip_code),
                profile_image_url = COALESCE($10, profile_image_url),
                role = COALESCE($11, role),
                password_hash = COALESCE($12, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.phone)
        .bind(request.date_of_birth)
        .bind(&request.address)
        .bind(&request.city)
        .bind(&request.state)
        .bind(&request.zip_code)
        .bind(&request.profile_image_url)
        .bind(request.role)
        .bind(&request.password_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if request.role.is_some() {
            RoleRecords::new(&mut tx).ensure_for_profile(profile.id, profile.role).await?;
        }

        tx.commit().await?;
        Ok(profile)
    }
}

impl<'c> Profiles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ProfileFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM profiles WHERE 1=1");
        filter.push_conditions(&mut query);
        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// Emails are compared lowercased.
    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<ProfileDBResponse>> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>("SELECT * FROM profiles WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(profile)
    }

    #[instrument(skip(self), err)]
    pub async fn count_by_role(&mut self, role: Role) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles WHERE role = $1")
            .bind(role)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn create_request(email: &str, role: Role) -> ProfileCreateDBRequest {
        ProfileCreateDBRequest {
            email: email.to_string(),
            first_name: "Test".to_string(),
            last_name: "Person".to_string(),
            phone: None,
            role,
            password_hash: None,
            auth_source: "test".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn create_lowercases_email_and_provisions_role_record(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let profile = Profiles::new(&mut conn)
            .create(&create_request("Nurse.Jones@Example.com", Role::Clinician))
            .await
            .unwrap();
        assert_eq!(profile.email, "nurse.jones@example.com");

        let clinician = RoleRecords::new(&mut conn).clinician_by_profile(profile.id).await.unwrap();
        assert!(clinician.is_some());
        assert_eq!(clinician.unwrap().license_number, "PENDING");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn duplicate_email_is_a_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);
        repo.create(&create_request("dup@example.com", Role::Patient)).await.unwrap();

        let err = repo.create(&create_request("DUP@example.com", Role::Caregiver)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn list_filters_by_role_and_search(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Profiles::new(&mut conn);
        repo.create(&create_request("alice@example.com", Role::Patient)).await.unwrap();
        repo.create(&create_request("bob@example.com", Role::Patient)).await.unwrap();
        repo.create(&create_request("carol@example.com", Role::Clinician)).await.unwrap();

        let filter = ProfileFilter {
            role: Some(Role::Patient),
            search: Some("ALI".to_string()),
            ..ProfileFilter::new(0, 10)
        };
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "alice@example.com");
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
        assert_eq!(repo.count_by_role(Role::Patient).await.unwrap(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn role_change_provisions_new_role_record(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let profile = Profiles::new(&mut conn)
            .create(&create_request("switch@example.com", Role::Patient))
            .await
            .unwrap();

        let updated = Profiles::new(&mut conn)
            .update(
                profile.id,
                &ProfileUpdateDBRequest {
                    role: Some(Role::Caregiver),
                    first_name: Some("Switched".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Caregiver);
        assert_eq!(updated.first_name, "Switched");
        assert_eq!(updated.last_name, "Person");

        assert!(RoleRecords::new(&mut conn).caregiver_by_profile(profile.id).await.unwrap().is_some());
    }
}
