//! Database repository for patient alerts.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::alerts::{AlertCreateDBRequest, AlertDBResponse, AlertWithPatient},
    },
    types::{AlertId, PatientId, ProfileId, abbrev_uuid},
};

const ALERT_WITH_PATIENT: &str = r#"
    SELECT a.*, p.first_name AS patient_first_name, p.last_name AS patient_last_name
    FROM patient_alerts a
    JOIN patients pt ON pt.id = a.patient_id
    JOIN profiles p ON p.id = pt.profile_id
"#;

pub struct Alerts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Alerts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(patient_id = %abbrev_uuid(&request.patient_id)), err)]
    pub async fn create(&mut self, request: &AlertCreateDBRequest) -> Result<AlertDBResponse> {
        let alert = sqlx::query_as::<_, AlertDBResponse>(
            r#"
            INSERT INTO patient_alerts (patient_id, alert_type, severity, message, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.patient_id)
        .bind(&request.alert_type)
        .bind(request.severity)
        .bind(&request.message)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(alert)
    }

    #[instrument(skip(self), fields(alert_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: AlertId) -> Result<Option<AlertDBResponse>> {
        let alert = sqlx::query_as::<_, AlertDBResponse>("SELECT * FROM patient_alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(alert)
    }

    /// Alerts for the given patients, newest first. `None` means every patient.
    #[instrument(skip(self, patient_ids), err)]
    pub async fn list_for_patients(&mut self, patient_ids: Option<&[PatientId]>, active: bool) -> Result<Vec<AlertWithPatient>> {
        let query = format!(
            "{ALERT_WITH_PATIENT} WHERE ($1::uuid[] IS NULL OR a.patient_id = ANY($1)) AND (a.resolved_at IS NULL) = $2 ORDER BY a.created_at DESC"
        );
        let alerts = sqlx::query_as::<_, AlertWithPatient>(&query)
            .bind(patient_ids)
            .bind(active)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(alerts)
    }

    #[instrument(skip(self, patient_ids), err)]
    pub async fn recent_unresolved(&mut self, patient_ids: &[PatientId], limit: i64) -> Result<Vec<AlertWithPatient>> {
        let query =
            format!("{ALERT_WITH_PATIENT} WHERE a.patient_id = ANY($1) AND a.resolved_at IS NULL ORDER BY a.created_at DESC LIMIT $2");
        let alerts = sqlx::query_as::<_, AlertWithPatient>(&query)
            .bind(patient_ids)
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(alerts)
    }

    /// Unresolved critical and high alerts across the given patients.
    #[instrument(skip(self, patient_ids), err)]
    pub async fn count_urgent_unresolved(&mut self, patient_ids: &[PatientId]) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM patient_alerts
            WHERE patient_id = ANY($1) AND resolved_at IS NULL AND severity IN ('critical', 'high')
            "#,
        )
        .bind(patient_ids)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// Returns `None` when the alert is already resolved or does not exist.
    #[instrument(skip(self), fields(alert_id = %abbrev_uuid(&id)), err)]
    pub async fn resolve(&mut self, id: AlertId, resolved_by: ProfileId) -> Result<Option<AlertDBResponse>> {
        let alert = sqlx::query_as::<_, AlertDBResponse>(
            r#"
            UPDATE patient_alerts
            SET resolved_at = NOW(), resolved_by = $2
            WHERE id = $1 AND resolved_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(resolved_by)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::profiles::Role,
        db::models::alerts::AlertSeverity,
        test_utils::{create_test_user, link_clinician},
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn resolving_sets_both_fields_and_only_once(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let patient_id = link_clinician(&pool, &patient, &clinician).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut alerts = Alerts::new(&mut conn);
        let alert = alerts
            .create(&AlertCreateDBRequest {
                patient_id,
                alert_type: "vitals".to_string(),
                severity: AlertSeverity::Critical,
                message: "Blood pressure 190/110".to_string(),
                created_by: clinician.id,
            })
            .await
            .unwrap();
        assert_eq!(alerts.count_urgent_unresolved(&[patient_id]).await.unwrap(), 1);

        let resolved = alerts.resolve(alert.id, clinician.id).await.unwrap().unwrap();
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.resolved_by, Some(clinician.id));
        assert!(alerts.resolve(alert.id, clinician.id).await.unwrap().is_none());

        let ids = [patient_id];
        assert!(alerts.list_for_patients(Some(&ids), true).await.unwrap().is_empty());
        let history = alerts.list_for_patients(Some(&ids), false).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].patient_first_name, "Test");
        assert_eq!(alerts.count_urgent_unresolved(&ids).await.unwrap(), 0);
    }
}
