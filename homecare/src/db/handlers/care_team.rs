//! Database repository for care-team links.

use crate::{
    db::{
        errors::Result,
        models::care_team::{
            CaregiverLinkCreateDBRequest, CaregiverMember, ClinicianLinkCreateDBRequest, ClinicianMember, PatientCaregiverDBResponse,
            PatientClinicianDBResponse,
        },
    },
    types::{CaregiverId, ClinicianId, PatientId, abbrev_uuid},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct CareTeam<'c> {
    db: &'c mut PgConnection,
}

impl<'c> CareTeam<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Fails with a unique violation when an active link already exists.
    #[instrument(skip(self, request), fields(patient_id = %abbrev_uuid(&request.patient_id), clinician_id = %abbrev_uuid(&request.clinician_id)), err)]
    pub async fn assign_clinician(&mut self, request: &ClinicianLinkCreateDBRequest) -> Result<PatientClinicianDBResponse> {
        let link = sqlx::query_as::<_, PatientClinicianDBResponse>(
            r#"
            INSERT INTO patient_clinicians (patient_id, clinician_id, relationship_type, access_level, assigned_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.patient_id)
        .bind(request.clinician_id)
        .bind(request.relationship_type)
        .bind(request.access_level)
        .bind(request.assigned_by)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(link)
    }

    /// Fails with a unique violation when an active link already exists.
    #[instrument(skip(self, request), fields(patient_id = %abbrev_uuid(&request.patient_id), caregiver_id = %abbrev_uuid(&request.caregiver_id)), err)]
    pub async fn link_caregiver(&mut self, request: &CaregiverLinkCreateDBRequest) -> Result<PatientCaregiverDBResponse> {
        let link = sqlx::query_as::<_, PatientCaregiverDBResponse>(
            r#"
            INSERT INTO patient_caregivers (
                patient_id, caregiver_id, relationship_type, is_mpoa, access_level,
                can_view_records, can_message, can_schedule, can_manage_medications
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(request.patient_id)
        .bind(request.caregiver_id)
        .bind(&request.relationship_type)
        .bind(request.is_mpoa)
        .bind(request.access_level)
        .bind(request.permissions.can_view_records)
        .bind(request.permissions.can_message)
        .bind(request.permissions.can_schedule)
        .bind(request.permissions.can_manage_medications)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(link)
    }

    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id), clinician_id = %abbrev_uuid(&clinician_id)), err)]
    pub async fn active_clinician_link(
        &mut self,
        patient_id: PatientId,
        clinician_id: ClinicianId,
    ) -> Result<Option<PatientClinicianDBResponse>> {
        let link = sqlx::query_as::<_, PatientClinicianDBResponse>(
            "SELECT * FROM patient_clinicians WHERE patient_id = $1 AND clinician_id = $2 AND revoked_at IS NULL",
        )
        .bind(patient_id)
        .bind(clinician_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(link)
    }

    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id), caregiver_id = %abbrev_uuid(&caregiver_id)), err)]
    pub async fn active_caregiver_link(
        &mut self,
        patient_id: PatientId,
        caregiver_id: CaregiverId,
    ) -> Result<Option<PatientCaregiverDBResponse>> {
        let link = sqlx::query_as::<_, PatientCaregiverDBResponse>(
            "SELECT * FROM patient_caregivers WHERE patient_id = $1 AND caregiver_id = $2 AND revoked_at IS NULL",
        )
        .bind(patient_id)
        .bind(caregiver_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(link)
    }

    #[instrument(skip(self), fields(clinician_id = %abbrev_uuid(&clinician_id)), err)]
    pub async fn patient_ids_for_clinician(&mut self, clinician_id: ClinicianId) -> Result<Vec<PatientId>> {
        let ids = sqlx::query_scalar::<_, PatientId>(
            "SELECT patient_id FROM patient_clinicians WHERE clinician_id = $1 AND revoked_at IS NULL ORDER BY assigned_at",
        )
        .bind(clinician_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(ids)
    }

    #[instrument(skip(self), fields(caregiver_id = %abbrev_uuid(&caregiver_id)), err)]
    pub async fn patient_ids_for_caregiver(&mut self, caregiver_id: CaregiverId) -> Result<Vec<PatientId>> {
        let ids = sqlx::query_scalar::<_, PatientId>(
            "SELECT patient_id FROM patient_caregivers WHERE caregiver_id = $1 AND revoked_at IS NULL ORDER BY created_at",
        )
        .bind(caregiver_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(ids)
    }

    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id)), err)]
    pub async fn clinicians_for_patient(&mut self, patient_id: PatientId) -> Result<Vec<ClinicianMember>> {
        let members = sqlx::query_as::<_, ClinicianMember>(
            r#"
            SELECT c.id AS clinician_id, p.id AS profile_id, p.first_name, p.last_name, p.email, p.phone,
                   c.specialization, pc.relationship_type, pc.access_level, pc.assigned_at
            FROM patient_clinicians pc
            JOIN clinicians c ON c.id = pc.clinician_id
            JOIN profiles p ON p.id = c.profile_id
            WHERE pc.patient_id = $1 AND pc.revoked_at IS NULL
            ORDER BY pc.assigned_at
            "#,
        )
        .bind(patient_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(members)
    }

    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id)), err)]
    pub async fn caregivers_for_patient(&mut self, patient_id: PatientId) -> Result<Vec<CaregiverMember>> {
        let members = sqlx::query_as::<_, CaregiverMember>(
            r#"
            SELECT cg.id AS caregiver_id, p.id AS profile_id, p.first_name, p.last_name, p.email, p.phone,
                   pcg.relationship_type, pcg.is_mpoa, pcg.access_level,
                   pcg.can_view_records, pcg.can_message, pcg.can_schedule, pcg.can_manage_medications
            FROM patient_caregivers pcg
            JOIN caregivers cg ON cg.id = pcg.caregiver_id
            JOIN profiles p ON p.id = cg.profile_id
            WHERE pcg.patient_id = $1 AND pcg.revoked_at IS NULL
            ORDER BY pcg.created_at
            "#,
        )
        .bind(patient_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(members)
    }

    /// Soft-revoke the active link. Returns false when there was none.
    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id), clinician_id = %abbrev_uuid(&clinician_id)), err)]
    pub async fn revoke_clinician(&mut self, patient_id: PatientId, clinician_id: ClinicianId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE patient_clinicians SET revoked_at = NOW(), updated_at = NOW()
            WHERE patient_id = $1 AND clinician_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(patient_id)
        .bind(clinician_id)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-revoke the active link. Returns false when there was none.
    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id), caregiver_id = %abbrev_uuid(&caregiver_id)), err)]
    pub async fn revoke_caregiver(&mut self, patient_id: PatientId, caregiver_id: CaregiverId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE patient_caregivers SET revoked_at = NOW(), updated_at = NOW()
            WHERE patient_id = $1 AND caregiver_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(patient_id)
        .bind(caregiver_id)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::profiles::Role,
        db::models::care_team::{AccessLevel, CaregiverPermissions, ClinicianRelationship},
        errors::Error,
        test_utils::{create_test_user, role_record_ids},
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn revoked_links_leave_active_listings(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let (patient_id, clinician_id) = (
            role_record_ids(&pool, patient.id).await.patient.unwrap(),
            role_record_ids(&pool, clinician.id).await.clinician.unwrap(),
        );

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CareTeam::new(&mut conn);
        repo.assign_clinician(&ClinicianLinkCreateDBRequest {
            patient_id,
            clinician_id,
            relationship_type: ClinicianRelationship::Primary,
            access_level: AccessLevel::Full,
            assigned_by: None,
        })
        .await
        .unwrap();

        assert_eq!(repo.clinicians_for_patient(patient_id).await.unwrap().len(), 1);
        assert_eq!(repo.patient_ids_for_clinician(clinician_id).await.unwrap(), vec![patient_id]);

        assert!(repo.revoke_clinician(patient_id, clinician_id).await.unwrap());
        assert!(!repo.revoke_clinician(patient_id, clinician_id).await.unwrap());
        assert!(repo.clinicians_for_patient(patient_id).await.unwrap().is_empty());
        assert!(repo.active_clinician_link(patient_id, clinician_id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn only_one_active_caregiver_link_per_pair(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let caregiver = create_test_user(&pool, Role::Caregiver).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();
        let caregiver_id = role_record_ids(&pool, caregiver.id).await.caregiver.unwrap();

        let request = CaregiverLinkCreateDBRequest {
            patient_id,
            caregiver_id,
            relationship_type: "daughter".to_string(),
            is_mpoa: true,
            access_level: AccessLevel::Standard,
            permissions: CaregiverPermissions::default(),
        };

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CareTeam::new(&mut conn);
        repo.link_caregiver(&request).await.unwrap();

        let err = repo.link_caregiver(&request).await.unwrap_err();
        assert_eq!(Error::Database(err).user_message(), "This caregiver already has access to the patient");

        // Re-linking after a revocation is allowed
        assert!(repo.revoke_caregiver(patient_id, caregiver_id).await.unwrap());
        repo.link_caregiver(&request).await.unwrap();
        let members = repo.caregivers_for_patient(patient_id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].is_mpoa);
    }
}
