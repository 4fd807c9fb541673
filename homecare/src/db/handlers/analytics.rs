//! Agency-wide aggregate queries.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::{errors::Result, models::analytics::AdminCounts};

pub struct Analytics<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Analytics<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Headline counts in one round trip. Clinicians are counted by profile role, so a clinician
    /// who never completed onboarding still shows up.
    #[instrument(skip(self), err)]
    pub async fn admin_counts(&mut self) -> Result<AdminCounts> {
        let counts = sqlx::query_as::<_, AdminCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM patients) AS patients,
                (SELECT COUNT(*) FROM profiles WHERE role = 'clinician') AS clinicians,
                (SELECT COUNT(*) FROM caregivers) AS caregivers,
                (SELECT COUNT(*) FROM visits WHERE status = 'scheduled') AS scheduled_visits,
                (SELECT COUNT(*) FROM visits WHERE status = 'completed') AS completed_visits,
                (SELECT COUNT(*) FROM messages WHERE NOT is_read) AS unread_messages,
                (SELECT COUNT(*) FROM care_plans WHERE status = 'active') AS active_care_plans
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::models::profiles::Role, test_utils::create_test_user};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn counts_role_records(pool: PgPool) {
        create_test_user(&pool, Role::Patient).await;
        create_test_user(&pool, Role::Patient).await;
        create_test_user(&pool, Role::Clinician).await;
        create_test_user(&pool, Role::Caregiver).await;

        let mut conn = pool.acquire().await.unwrap();
        let counts = Analytics::new(&mut conn).admin_counts().await.unwrap();
        assert_eq!(
            counts,
            AdminCounts {
                patients: 2,
                clinicians: 1,
                caregivers: 1,
                ..Default::default()
            }
        );
    }
}
