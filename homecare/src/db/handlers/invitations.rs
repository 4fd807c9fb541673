//! Database repositories for care-team and caregiver invitations.
//!
//! Every status change is a conditional update on `status = 'pending' AND expires_at > NOW()`, so
//! two racing responses cannot both succeed and an expired invitation cannot be answered.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::invitations::{
            CaregiverInvitationCreateDBRequest, CaregiverInvitationDBResponse, CaregiverInvitationWithPatient, InvitationCreateDBRequest,
            InvitationDBResponse, InvitationStatus, InvitationWithProfiles,
        },
    },
    types::{InvitationId, PatientId, ProfileId, abbrev_uuid},
};

const INVITATION_WITH_PROFILES: &str = r#"
    SELECT i.*,
           inv.first_name AS inviter_first_name, inv.last_name AS inviter_last_name,
           inv.email AS inviter_email, inv.role AS inviter_role,
           ee.first_name AS invitee_first_name, ee.last_name AS invitee_last_name, ee.role AS invitee_role
    FROM invitations i
    JOIN profiles inv ON inv.id = i.inviter_id
    LEFT JOIN profiles ee ON ee.id = i.invitee_id
"#;

pub struct Invitations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Invitations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(inviter_id = %abbrev_uuid(&request.inviter_id)), err)]
    pub async fn create(&mut self, request: &InvitationCreateDBRequest) -> Result<InvitationDBResponse> {
        let invitation = sqlx::query_as::<_, InvitationDBResponse>(
            r#"
            INSERT INTO invitations (inviter_id, invitee_email, invitee_id, invitation_type, patient_id, clinician_id, message, expires_at)
            VALUES ($1, LOWER($2), $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.inviter_id)
        .bind(&request.invitee_email)
        .bind(request.invitee_id)
        .bind(request.invitation_type)
        .bind(request.patient_id)
        .bind(request.clinician_id)
        .bind(&request.message)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(invitation)
    }

    #[instrument(skip(self), fields(invitation_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: InvitationId) -> Result<Option<InvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, InvitationDBResponse>("SELECT * FROM invitations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(invitation)
    }

    #[instrument(skip(self), fields(invitation_id = %abbrev_uuid(&id)), err)]
    pub async fn get_with_profiles(&mut self, id: InvitationId) -> Result<Option<InvitationWithProfiles>> {
        let query = format!("{INVITATION_WITH_PROFILES} WHERE i.id = $1");
        let invitation = sqlx::query_as::<_, InvitationWithProfiles>(&query)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(invitation)
    }

    /// A still-answerable invitation from `inviter_id` to `email`, if one exists.
    #[instrument(skip(self, email), fields(inviter_id = %abbrev_uuid(&inviter_id)), err)]
    pub async fn pending_duplicate(&mut self, inviter_id: ProfileId, email: &str) -> Result<Option<InvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, InvitationDBResponse>(
            r#"
            SELECT * FROM invitations
            WHERE inviter_id = $1 AND invitee_email = LOWER($2) AND status = 'pending' AND expires_at > NOW()
            LIMIT 1
            "#,
        )
        .bind(inviter_id)
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(invitation)
    }

    /// Invitations addressed to a profile, by id or by the email it was sent to. Newest first.
    #[instrument(skip(self, email), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn received(&mut self, profile_id: ProfileId, email: &str) -> Result<Vec<InvitationWithProfiles>> {
        let query = format!("{INVITATION_WITH_PROFILES} WHERE i.invitee_id = $1 OR i.invitee_email = LOWER($2) ORDER BY i.created_at DESC");
        let invitations = sqlx::query_as::<_, InvitationWithProfiles>(&query)
            .bind(profile_id)
            .bind(email)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(invitations)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn sent(&mut self, profile_id: ProfileId) -> Result<Vec<InvitationWithProfiles>> {
        let query = format!("{INVITATION_WITH_PROFILES} WHERE i.inviter_id = $1 ORDER BY i.created_at DESC");
        let invitations = sqlx::query_as::<_, InvitationWithProfiles>(&query)
            .bind(profile_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(invitations)
    }

    /// Accept or decline. Returns `None` when the invitation is no longer pending or has expired.
    /// Binds the invitee id so email-only invitations record who answered.
    #[instrument(skip(self), fields(invitation_id = %abbrev_uuid(&id)), err)]
    pub async fn respond(
        &mut self,
        id: InvitationId,
        invitee_id: ProfileId,
        status: InvitationStatus,
    ) -> Result<Option<InvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, InvitationDBResponse>(
            r#"
            UPDATE invitations
            SET status = $2, invitee_id = COALESCE(invitee_id, $3), responded_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND expires_at > NOW()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(invitee_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(invitation)
    }

    /// Withdraw a pending invitation. Only the inviter may cancel.
    #[instrument(skip(self), fields(invitation_id = %abbrev_uuid(&id)), err)]
    pub async fn cancel(&mut self, id: InvitationId, inviter_id: ProfileId) -> Result<Option<InvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, InvitationDBResponse>(
            r#"
            UPDATE invitations
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND inviter_id = $2 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(inviter_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(invitation)
    }

    #[instrument(skip(self, email), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn count_pending_received(&mut self, profile_id: ProfileId, email: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM invitations
            WHERE (invitee_id = $1 OR invitee_email = LOWER($2)) AND status = 'pending' AND expires_at > NOW()
            "#,
        )
        .bind(profile_id)
        .bind(email)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }
}

pub struct CaregiverInvitations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> CaregiverInvitations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(patient_id = %abbrev_uuid(&request.patient_id)), err)]
    pub async fn create(&mut self, request: &CaregiverInvitationCreateDBRequest) -> Result<CaregiverInvitationDBResponse> {
        let invitation = sqlx::query_as::<_, CaregiverInvitationDBResponse>(
            r#"
            INSERT INTO caregiver_invitations (
                patient_id, email, relationship_type, is_mpoa, access_level,
                can_view_records, can_message, can_schedule, can_manage_medications,
                message, invited_by, expires_at
            )
            VALUES ($1, LOWER($2), $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(request.patient_id)
        .bind(&request.email)
        .bind(&request.relationship_type)
        .bind(request.is_mpoa)
        .bind(request.access_level)
        .bind(request.permissions.can_view_records)
        .bind(request.permissions.can_message)
        .bind(request.permissions.can_schedule)
        .bind(request.permissions.can_manage_medications)
        .bind(&request.message)
        .bind(request.invited_by)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(invitation)
    }

    #[instrument(skip(self), fields(invitation_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: InvitationId) -> Result<Option<CaregiverInvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, CaregiverInvitationDBResponse>("SELECT * FROM caregiver_invitations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(invitation)
    }

    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id)), err)]
    pub async fn list_for_patient(&mut self, patient_id: PatientId) -> Result<Vec<CaregiverInvitationDBResponse>> {
        let invitations = sqlx::query_as::<_, CaregiverInvitationDBResponse>(
            "SELECT * FROM caregiver_invitations WHERE patient_id = $1 ORDER BY invited_at DESC",
        )
        .bind(patient_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(invitations)
    }

    #[instrument(skip(self, email), err)]
    pub async fn list_for_email(&mut self, email: &str) -> Result<Vec<CaregiverInvitationWithPatient>> {
        let invitations = sqlx::query_as::<_, CaregiverInvitationWithPatient>(
            r#"
            SELECT ci.*, p.first_name AS patient_first_name, p.last_name AS patient_last_name
            FROM caregiver_invitations ci
            JOIN patients pt ON pt.id = ci.patient_id
            JOIN profiles p ON p.id = pt.profile_id
            WHERE ci.email = LOWER($1)
            ORDER BY ci.invited_at DESC
            "#,
        )
        .bind(email)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(invitations)
    }

    /// A pending, unexpired invitation for this patient and email, if any.
    #[instrument(skip(self, email), fields(patient_id = %abbrev_uuid(&patient_id)), err)]
    pub async fn pending_duplicate(&mut self, patient_id: PatientId, email: &str) -> Result<Option<CaregiverInvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, CaregiverInvitationDBResponse>(
            r#"
            SELECT * FROM caregiver_invitations
            WHERE patient_id = $1 AND email = LOWER($2) AND status = 'pending' AND expires_at > NOW()
            LIMIT 1
            "#,
        )
        .bind(patient_id)
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(invitation)
    }

    /// Accept or decline. Returns `None` when the invitation is no longer pending or has expired.
    #[instrument(skip(self), fields(invitation_id = %abbrev_uuid(&id)), err)]
    pub async fn respond(&mut self, id: InvitationId, status: InvitationStatus) -> Result<Option<CaregiverInvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, CaregiverInvitationDBResponse>(
            r#"
            UPDATE caregiver_invitations
            SET status = $2, responded_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND expires_at > NOW()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(invitation)
    }

    #[instrument(skip(self), fields(invitation_id = %abbrev_uuid(&id)), err)]
    pub async fn cancel(&mut self, id: InvitationId, patient_id: PatientId) -> Result<Option<CaregiverInvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, CaregiverInvitationDBResponse>(
            r#"
            UPDATE caregiver_invitations
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND patient_id = $2 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patient_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(invitation)
    }

    #[instrument(skip(self, email), err)]
    pub async fn count_pending_for_email(&mut self, email: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM caregiver_invitations WHERE email = LOWER($1) AND status = 'pending' AND expires_at > NOW()",
        )
        .bind(email)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }
}

/// Expiry timestamp for an invitation created at `now`.
pub fn expires_at(now: DateTime<Utc>, ttl: std::time::Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(7))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::profiles::Role,
        db::models::{
            care_team::{AccessLevel, CaregiverPermissions},
            invitations::InvitationType,
        },
        test_utils::{create_test_user, role_record_ids},
    };
    use chrono::Duration;
    use sqlx::PgPool;

    fn request(inviter_id: ProfileId, patient_id: PatientId, email: &str, expires_at: DateTime<Utc>) -> InvitationCreateDBRequest {
        InvitationCreateDBRequest {
            inviter_id,
            invitee_email: email.to_string(),
            invitee_id: None,
            invitation_type: InvitationType::PatientToClinician,
            patient_id: Some(patient_id),
            clinician_id: None,
            message: None,
            expires_at,
        }
    }

    #[test]
    fn expiry_is_ttl_after_now() {
        let now = Utc::now();
        assert_eq!(expires_at(now, std::time::Duration::from_secs(3600)), now + Duration::hours(1));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn received_matches_by_email_case_insensitively(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut invitations = Invitations::new(&mut conn);
        let shouted = clinician.email.to_uppercase();
        let created = invitations
            .create(&request(patient.id, patient_id, &shouted, Utc::now() + Duration::days(7)))
            .await
            .unwrap();
        assert_eq!(created.invitee_email, clinician.email);

        let received = invitations.received(clinician.id, &clinician.email).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].inviter_role, Role::Patient);
        assert_eq!(invitations.count_pending_received(clinician.id, &clinician.email).await.unwrap(), 1);
        assert!(invitations.pending_duplicate(patient.id, &clinician.email).await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn responding_twice_only_succeeds_once(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut invitations = Invitations::new(&mut conn);
        let created = invitations
            .create(&request(patient.id, patient_id, &clinician.email, Utc::now() + Duration::days(7)))
            .await
            .unwrap();

        let accepted = invitations.respond(created.id, clinician.id, InvitationStatus::Accepted).await.unwrap().unwrap();
        assert_eq!(accepted.status, InvitationStatus::Accepted);
        assert_eq!(accepted.invitee_id, Some(clinician.id));
        assert!(accepted.responded_at.is_some());

        assert!(invitations.respond(created.id, clinician.id, InvitationStatus::Declined).await.unwrap().is_none());
        assert!(invitations.cancel(created.id, patient.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn expired_invitation_cannot_be_answered(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut invitations = Invitations::new(&mut conn);
        let created = invitations
            .create(&request(patient.id, patient_id, &clinician.email, Utc::now() - Duration::minutes(1)))
            .await
            .unwrap();

        assert_eq!(created.effective_status(Utc::now()), InvitationStatus::Expired);
        assert!(invitations.respond(created.id, clinician.id, InvitationStatus::Accepted).await.unwrap().is_none());
        assert_eq!(invitations.count_pending_received(clinician.id, &clinician.email).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn caregiver_invitation_cancel_is_scoped_to_patient(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let other = create_test_user(&pool, Role::Patient).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();
        let other_id = role_record_ids(&pool, other.id).await.patient.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut invitations = CaregiverInvitations::new(&mut conn);
        let created = invitations
            .create(&CaregiverInvitationCreateDBRequest {
                patient_id,
                email: "Family@Example.com".to_string(),
                relationship_type: "son".to_string(),
                is_mpoa: true,
                access_level: AccessLevel::Full,
                permissions: CaregiverPermissions::default(),
                message: Some("Please help with my meds".to_string()),
                invited_by: patient.id,
                expires_at: Utc::now() + Duration::days(7),
            })
            .await
            .unwrap();

        let listed = invitations.list_for_email("family@example.com").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].patient_first_name, "Test");

        assert!(invitations.cancel(created.id, other_id).await.unwrap().is_none());
        let cancelled = invitations.cancel(created.id, patient_id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, InvitationStatus::Cancelled);
    }
}
