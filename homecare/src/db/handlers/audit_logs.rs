//! Database repository for audit log rows. Rows are append-only.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::audit_logs::{AuditLogCreateDBRequest, AuditLogDBResponse, AuditLogWithActor},
};

pub struct AuditLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuditLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(action = %request.action), err)]
    pub async fn record(&mut self, request: &AuditLogCreateDBRequest) -> Result<AuditLogDBResponse> {
        let log = sqlx::query_as::<_, AuditLogDBResponse>(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.actor_id)
        .bind(request.action.as_str())
        .bind(request.action.entity_type())
        .bind(request.entity_id)
        .bind(&request.details)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(log)
    }

    #[instrument(skip(self), err)]
    pub async fn recent(&mut self, limit: i64) -> Result<Vec<AuditLogWithActor>> {
        let logs = sqlx::query_as::<_, AuditLogWithActor>(
            r#"
            SELECT l.*, p.first_name AS actor_first_name, p.last_name AS actor_last_name
            FROM audit_logs l
            LEFT JOIN profiles p ON p.id = l.actor_id
            ORDER BY l.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::models::profiles::Role, db::models::audit_logs::AuditAction, test_utils::create_test_user};
    use sqlx::PgPool;
    use uuid::Uuid;

    #[sqlx::test]
    #[test_log::test]
    async fn recent_returns_newest_first_with_actor_name(pool: PgPool) {
        let admin = create_test_user(&pool, Role::AgencyAdmin).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut logs = AuditLogs::new(&mut conn);

        logs.record(&AuditLogCreateDBRequest::new(admin.id, AuditAction::AlertResolved, Uuid::new_v4()))
            .await
            .unwrap();
        logs.record(
            &AuditLogCreateDBRequest::new(admin.id, AuditAction::ProfileRoleChanged, admin.id)
                .with_details(serde_json::json!({ "from": "patient", "to": "clinician" })),
        )
        .await
        .unwrap();

        let recent = logs.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].log.action, "profile.role_changed");
        assert_eq!(recent[0].log.entity_type, "profiles");
        assert_eq!(recent[1].log.entity_type, "patient_alerts");
        assert_eq!(recent[0].actor_first_name.as_deref(), Some("Test"));
    }
}
