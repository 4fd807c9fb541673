//! Database repository for patient, clinician, caregiver, physician and vendor records.
//!
//! Every non-admin profile owns exactly one record in the table for its role. Records are
//! created lazily with [`RoleRecords::ensure_for_profile`], so callers never need to care
//! whether registration or a later role change created them.

use crate::{
    api::models::profiles::Role,
    db::{
        errors::Result,
        models::role_records::{
            CaregiverDBResponse, ClinicianDBResponse, PatientDBResponse, PatientDetail, PhysicianDBResponse, VendorDBResponse,
        },
    },
    types::{PatientId, ProfileId, abbrev_uuid},
};
use sqlx::PgConnection;
use tracing::instrument;

const PATIENT_DETAIL_SELECT: &str = r#"
    SELECT pt.*, p.first_name, p.last_name, p.email, p.phone, p.date_of_birth, p.address, p.city, p.state, p.zip_code
    FROM patients pt
    JOIN profiles p ON p.id = pt.profile_id
"#;

pub struct RoleRecords<'c> {
    db: &'c mut PgConnection,
}

impl<'c> RoleRecords<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create the role record for `role` if it doesn't exist. Agency admins have none.
    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id), role = %role), err)]
    pub async fn ensure_for_profile(&mut self, profile_id: ProfileId, role: Role) -> Result<()> {
        let statement = match role {
            Role::Patient => "INSERT INTO patients (profile_id) VALUES ($1) ON CONFLICT (profile_id) DO NOTHING",
            Role::Clinician => "INSERT INTO clinicians (profile_id) VALUES ($1) ON CONFLICT (profile_id) DO NOTHING",
            Role::Caregiver => "INSERT INTO caregivers (profile_id) VALUES ($1) ON CONFLICT (profile_id) DO NOTHING",
            Role::Physician => "INSERT INTO physicians (profile_id) VALUES ($1) ON CONFLICT (profile_id) DO NOTHING",
            Role::Vendor => "INSERT INTO vendors (profile_id) VALUES ($1) ON CONFLICT (profile_id) DO NOTHING",
            Role::AgencyAdmin => return Ok(()),
        };
        sqlx::query(statement).bind(profile_id).execute(&mut *self.db).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn patient_by_profile(&mut self, profile_id: ProfileId) -> Result<Option<PatientDBResponse>> {
        let patient = sqlx::query_as::<_, PatientDBResponse>("SELECT * FROM patients WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(patient)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn clinician_by_profile(&mut self, profile_id: ProfileId) -> Result<Option<ClinicianDBResponse>> {
        let clinician = sqlx::query_as::<_, ClinicianDBResponse>("SELECT * FROM clinicians WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(clinician)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn caregiver_by_profile(&mut self, profile_id: ProfileId) -> Result<Option<CaregiverDBResponse>> {
        let caregiver = sqlx::query_as::<_, CaregiverDBResponse>("SELECT * FROM caregivers WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(caregiver)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn physician_by_profile(&mut self, profile_id: ProfileId) -> Result<Option<PhysicianDBResponse>> {
        let physician = sqlx::query_as::<_, PhysicianDBResponse>("SELECT * FROM physicians WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(physician)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn vendor_by_profile(&mut self, profile_id: ProfileId) -> Result<Option<VendorDBResponse>> {
        let vendor = sqlx::query_as::<_, VendorDBResponse>("SELECT * FROM vendors WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(vendor)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn ensure_patient(&mut self, profile_id: ProfileId) -> Result<PatientDBResponse> {
        let patient = sqlx::query_as::<_, PatientDBResponse>(
            r#"
            INSERT INTO patients (profile_id) VALUES ($1)
            ON CONFLICT (profile_id) DO UPDATE SET updated_at = patients.updated_at
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(patient)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn ensure_clinician(&mut self, profile_id: ProfileId) -> Result<ClinicianDBResponse> {
        let clinician = sqlx::query_as::<_, ClinicianDBResponse>(
            r#"
            INSERT INTO clinicians (profile_id) VALUES ($1)
            ON CONFLICT (profile_id) DO UPDATE SET updated_at = clinicians.updated_at
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(clinician)
    }

    #[instrument(skip(self), fields(profile_id = %abbrev_uuid(&profile_id)), err)]
    pub async fn ensure_caregiver(&mut self, profile_id: ProfileId) -> Result<CaregiverDBResponse> {
        let caregiver = sqlx::query_as::<_, CaregiverDBResponse>(
            r#"
            INSERT INTO caregivers (profile_id) VALUES ($1)
            ON CONFLICT (profile_id) DO UPDATE SET updated_at = caregivers.updated_at
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(caregiver)
    }

    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id)), err)]
    pub async fn get_patient(&mut self, patient_id: PatientId) -> Result<Option<PatientDetail>> {
        let sql = format!("{PATIENT_DETAIL_SELECT} WHERE pt.id = $1");
        let patient = sqlx::query_as::<_, PatientDetail>(&sql)
            .bind(patient_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(patient)
    }

    #[instrument(skip(self, patient_ids), fields(count = patient_ids.len()), err)]
    pub async fn list_patients(&mut self, patient_ids: &[PatientId]) -> Result<Vec<PatientDetail>> {
        if patient_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("{PATIENT_DETAIL_SELECT} WHERE pt.id = ANY($1) ORDER BY p.last_name, p.first_name");
        let patients = sqlx::query_as::<_, PatientDetail>(&sql)
            .bind(patient_ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(patients)
    }

    #[instrument(skip(self), err)]
    pub async fn list_all_patients(&mut self, skip: i64, limit: i64) -> Result<Vec<PatientDetail>> {
        let sql = format!("{PATIENT_DETAIL_SELECT} ORDER BY p.last_name, p.first_name LIMIT $1 OFFSET $2");
        let patients = sqlx::query_as::<_, PatientDetail>(&sql)
            .bind(limit)
            .bind(skip)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(patients)
    }

    /// Number of role records for `role`. Agency admins are counted from profiles.
    #[instrument(skip(self), fields(role = %role), err)]
    pub async fn count(&mut self, role: Role) -> Result<i64> {
        let statement = match role {
            Role::Patient => "SELECT COUNT(*) FROM patients",
            Role::Clinician => "SELECT COUNT(*) FROM clinicians",
            Role::Caregiver => "SELECT COUNT(*) FROM caregivers",
            Role::Physician => "SELECT COUNT(*) FROM physicians",
            Role::Vendor => "SELECT COUNT(*) FROM vendors",
            Role::AgencyAdmin => "SELECT COUNT(*) FROM profiles WHERE role = 'agency_admin'",
        };
        let count = sqlx::query_scalar::<_, i64>(statement).fetch_one(&mut *self.db).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn ensure_is_idempotent(pool: PgPool) {
        let user = create_test_user(&pool, Role::Patient).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = RoleRecords::new(&mut conn);

        let first = repo.ensure_patient(user.id).await.unwrap();
        let second = repo.ensure_patient(user.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.count(Role::Patient).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn patient_detail_carries_profile_name(pool: PgPool) {
        let user = create_test_user(&pool, Role::Patient).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = RoleRecords::new(&mut conn);

        let patient = repo.patient_by_profile(user.id).await.unwrap().unwrap();
        let detail = repo.get_patient(patient.id).await.unwrap().unwrap();
        assert_eq!(detail.email, user.email);
        assert_eq!(detail.full_name(), user.full_name());

        let listed = repo.list_patients(&[patient.id]).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn agency_admin_has_no_role_record(pool: PgPool) {
        let admin = create_test_user(&pool, Role::AgencyAdmin).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = RoleRecords::new(&mut conn);
        repo.ensure_for_profile(admin.id, Role::AgencyAdmin).await.unwrap();
        assert!(repo.patient_by_profile(admin.id).await.unwrap().is_none());
        assert!(repo.clinician_by_profile(admin.id).await.unwrap().is_none());
    }
}
