//! Database repository for medications and their dose logs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::medications::{
            MedicationCreateDBRequest, MedicationDBResponse, MedicationLogCreateDBRequest, MedicationLogDBResponse, MedicationUpdateDBRequest,
        },
    },
    types::{MedicationId, PatientId, abbrev_uuid},
};

#[derive(Debug, Clone)]
pub struct MedicationFilter {
    pub patient_id: PatientId,
    pub active_only: bool,
}

pub struct Medications<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Medications<'c> {
    type CreateRequest = MedicationCreateDBRequest;
    type UpdateRequest = MedicationUpdateDBRequest;
    type Response = MedicationDBResponse;
    type Id = MedicationId;
    type Filter = MedicationFilter;

    #[instrument(skip(self, request), fields(patient_id = %abbrev_uuid(&request.patient_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let medication = sqlx::query_as::<_, MedicationDBResponse>(
            r#"
            INSERT INTO medications (
                patient_id, name, dosage, frequency, instructions, prescribing_physician,
                start_date, end_date, reminder_enabled, reminder_times, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(request.patient_id)
        .bind(&request.name)
        .bind(&request.dosage)
        .bind(&request.frequency)
        .bind(&request.instructions)
        .bind(&request.prescribing_physician)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.reminder_enabled)
        .bind(&request.reminder_times)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(medication)
    }

    #[instrument(skip(self), fields(medication_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let medication = sqlx::query_as::<_, MedicationDBResponse>("SELECT * FROM medications WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(medication)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let medications = sqlx::query_as::<_, MedicationDBResponse>("SELECT * FROM medications WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(medications.into_iter().map(|m| (m.id, m)).collect())
    }

    /// Active medications first, then by name.
    #[instrument(skip(self, filter), fields(patient_id = %abbrev_uuid(&filter.patient_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let medications = sqlx::query_as::<_, MedicationDBResponse>(
            r#"
            SELECT * FROM medications
            WHERE patient_id = $1 AND (NOT $2 OR is_active)
            ORDER BY is_active DESC, name
            "#,
        )
        .bind(filter.patient_id)
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(medications)
    }

    #[instrument(skip(self), fields(medication_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM medications WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(medication_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let medication = sqlx::query_as::<_, MedicationDBResponse>(
            r#"
            UPDATE medications SET
                name = COALESCE($2, name),
                dosage = COALESCE($3, dosage),
                frequency = COALESCE($4, frequency),
                instructions = COALESCE($5, instructions),
                prescribing_physician = COALESCE($6, prescribing_physician),
                start_date = COALESCE($7, start_date),
                end_date = COALESCE($8, end_date),
                reminder_enabled = COALESCE($9, reminder_enabled),
                reminder_times = COALESCE($10, reminder_times),
                is_active = COALESCE($11, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.dosage)
        .bind(&request.frequency)
        .bind(&request.instructions)
        .bind(&request.prescribing_physician)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.reminder_enabled)
        .bind(&request.reminder_times)
        .bind(request.is_active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(medication)
    }
}

impl<'c> Medications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(medication_id = %abbrev_uuid(&request.medication_id)), err)]
    pub async fn create_log(&mut self, request: &MedicationLogCreateDBRequest) -> Result<MedicationLogDBResponse> {
        let log = sqlx::query_as::<_, MedicationLogDBResponse>(
            r#"
            INSERT INTO medication_logs (medication_id, patient_id, scheduled_time, taken_at, status, notes, logged_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.medication_id)
        .bind(request.patient_id)
        .bind(request.scheduled_time)
        .bind(request.taken_at)
        .bind(request.status)
        .bind(&request.notes)
        .bind(request.logged_by)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(log)
    }

    /// Dose logs scheduled at or after `since`, newest first.
    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id)), err)]
    pub async fn logs_since(&mut self, patient_id: PatientId, since: DateTime<Utc>) -> Result<Vec<MedicationLogDBResponse>> {
        let logs = sqlx::query_as::<_, MedicationLogDBResponse>(
            "SELECT * FROM medication_logs WHERE patient_id = $1 AND scheduled_time >= $2 ORDER BY scheduled_time DESC",
        )
        .bind(patient_id)
        .bind(since)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::profiles::Role,
        db::models::medications::MedicationLogStatus,
        test_utils::{create_test_user, role_record_ids},
    };
    use chrono::Duration;
    use sqlx::PgPool;

    fn lisinopril(patient_id: PatientId, created_by: uuid::Uuid) -> MedicationCreateDBRequest {
        MedicationCreateDBRequest {
            patient_id,
            name: "Lisinopril".to_string(),
            dosage: "10mg".to_string(),
            frequency: "Once daily".to_string(),
            instructions: Some("Take with water".to_string()),
            prescribing_physician: None,
            start_date: None,
            end_date: None,
            reminder_enabled: true,
            reminder_times: vec!["09:00".to_string()],
            created_by,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn deactivated_medications_drop_out_of_active_list(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let mut meds = Medications::new(&mut conn);

        let med = meds.create(&lisinopril(patient_id, patient.id)).await.unwrap();
        assert_eq!(med.reminder_times, vec!["09:00".to_string()]);

        let updated = meds
            .update(
                med.id,
                &MedicationUpdateDBRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.dosage, "10mg");

        let active = meds.list(&MedicationFilter { patient_id, active_only: true }).await.unwrap();
        assert!(active.is_empty());
        let all = meds.list(&MedicationFilter { patient_id, active_only: false }).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn logs_since_excludes_older_doses(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let mut meds = Medications::new(&mut conn);
        let med = meds.create(&lisinopril(patient_id, patient.id)).await.unwrap();

        for (days_ago, status) in [(1, MedicationLogStatus::Taken), (2, MedicationLogStatus::Missed), (40, MedicationLogStatus::Taken)] {
            meds.create_log(&MedicationLogCreateDBRequest {
                medication_id: med.id,
                patient_id,
                scheduled_time: Utc::now() - Duration::days(days_ago),
                taken_at: None,
                status,
                notes: None,
                logged_by: patient.id,
            })
            .await
            .unwrap();
        }

        let recent = meds.logs_since(patient_id, Utc::now() - Duration::days(30)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].status, MedicationLogStatus::Taken);
    }
}
