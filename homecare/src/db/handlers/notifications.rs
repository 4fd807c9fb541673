//! Database repository for notifications.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::notifications::{NotificationCreateDBRequest, NotificationDBResponse},
    },
    types::{NotificationId, ProfileId, abbrev_uuid},
};

pub struct Notifications<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), title = %request.title), err)]
    pub async fn create(&mut self, request: &NotificationCreateDBRequest) -> Result<NotificationDBResponse> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            INSERT INTO notifications (user_id, title, message, type, priority, action_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(&request.title)
        .bind(&request.message)
        .bind(request.notification_type)
        .bind(request.priority)
        .bind(&request.action_url)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(notification)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: ProfileId, unread_only: bool, skip: i64, limit: i64) -> Result<Vec<NotificationDBResponse>> {
        let notifications = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(notifications)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn count_unread(&mut self, user_id: ProfileId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    /// Returns the notification, or None when it doesn't belong to `user_id`.
    #[instrument(skip(self), fields(notification_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_read(&mut self, id: NotificationId, user_id: ProfileId) -> Result<Option<NotificationDBResponse>> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            UPDATE notifications SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(notification)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn mark_all_read(&mut self, user_id: ProfileId) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE, read_at = NOW() WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
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
        db::models::notifications::{NotificationPriority, NotificationType},
        test_utils::create_test_user,
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn invitation_notice_and_read_tracking(pool: PgPool) {
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let stranger = create_test_user(&pool, Role::Patient).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut notifications = Notifications::new(&mut conn);

        let notice = notifications
            .create(&NotificationCreateDBRequest::new_invitation(clinician.id, Role::Patient))
            .await
            .unwrap();
        assert_eq!(notice.title, "New Invitation");
        assert_eq!(notice.message, "You have received an invitation from a patient");
        assert_eq!(notice.notification_type, NotificationType::System);
        assert_eq!(notice.priority, NotificationPriority::Normal);
        assert_eq!(notice.action_url.as_deref(), Some("/dashboard/invitations"));

        notifications
            .create(&NotificationCreateDBRequest::new_message(clinician.id, "Pat Patient"))
            .await
            .unwrap();
        assert_eq!(notifications.count_unread(clinician.id).await.unwrap(), 2);

        assert!(notifications.mark_read(notice.id, stranger.id).await.unwrap().is_none());
        assert!(notifications.mark_read(notice.id, clinician.id).await.unwrap().unwrap().is_read);
        assert_eq!(notifications.list_for_user(clinician.id, true, 0, 10).await.unwrap().len(), 1);

        assert_eq!(notifications.mark_all_read(clinician.id).await.unwrap(), 1);
        assert_eq!(notifications.count_unread(clinician.id).await.unwrap(), 0);
    }
}
