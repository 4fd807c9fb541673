//! Database repository for messages and physician messages.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::messages::{MessageCreateDBRequest, MessageDBResponse, MessageWithParticipants, PhysicianMessageWithNames},
    },
    types::{MessageId, PhysicianId, ProfileId, abbrev_uuid},
};

const MESSAGE_WITH_PARTICIPANTS: &str = r#"
    SELECT m.*,
           s.first_name AS sender_first_name, s.last_name AS sender_last_name, s.role AS sender_role,
           r.first_name AS recipient_first_name, r.last_name AS recipient_last_name, r.role AS recipient_role
    FROM messages m
    JOIN profiles s ON s.id = m.sender_id
    JOIN profiles r ON r.id = m.recipient_id
"#;

pub struct Messages<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Messages<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(sender_id = %abbrev_uuid(&request.sender_id), recipient_id = %abbrev_uuid(&request.recipient_id)), err)]
    pub async fn create(&mut self, request: &MessageCreateDBRequest) -> Result<MessageDBResponse> {
        let message = sqlx::query_as::<_, MessageDBResponse>(
            r#"
            INSERT INTO messages (sender_id, recipient_id, subject, body, parent_message_id, patient_context_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.sender_id)
        .bind(request.recipient_id)
        .bind(&request.subject)
        .bind(&request.body)
        .bind(request.parent_message_id)
        .bind(request.patient_context_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(message)
    }

    #[instrument(skip(self), fields(message_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: MessageId) -> Result<Option<MessageDBResponse>> {
        let message = sqlx::query_as::<_, MessageDBResponse>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(message)
    }

    #[instrument(skip(self), fields(message_id = %abbrev_uuid(&id)), err)]
    pub async fn get_with_participants(&mut self, id: MessageId) -> Result<Option<MessageWithParticipants>> {
        let message = sqlx::query_as::<_, MessageWithParticipants>(&format!("{MESSAGE_WITH_PARTICIPANTS} WHERE m.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(message)
    }

    /// Messages received by `recipient_id`, newest first.
    #[instrument(skip(self), fields(recipient_id = %abbrev_uuid(&recipient_id)), err)]
    pub async fn inbox(&mut self, recipient_id: ProfileId, skip: i64, limit: i64) -> Result<Vec<MessageWithParticipants>> {
        let messages = sqlx::query_as::<_, MessageWithParticipants>(&format!(
            "{MESSAGE_WITH_PARTICIPANTS} WHERE m.recipient_id = $1 ORDER BY m.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(recipient_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(messages)
    }

    /// Messages sent by `sender_id`, newest first.
    #[instrument(skip(self), fields(sender_id = %abbrev_uuid(&sender_id)), err)]
    pub async fn sent(&mut self, sender_id: ProfileId, skip: i64, limit: i64) -> Result<Vec<MessageWithParticipants>> {
        let messages = sqlx::query_as::<_, MessageWithParticipants>(&format!(
            "{MESSAGE_WITH_PARTICIPANTS} WHERE m.sender_id = $1 ORDER BY m.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(sender_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(messages)
    }

    /// Mark read on behalf of the recipient. Returns false if the caller isn't the recipient or
    /// the message was already read.
    #[instrument(skip(self), fields(message_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_read(&mut self, id: MessageId, recipient_id: ProfileId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE, read_at = NOW(), updated_at = NOW() WHERE id = $1 AND recipient_id = $2 AND NOT is_read",
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(recipient_id = %abbrev_uuid(&recipient_id)), err)]
    pub async fn count_unread(&mut self, recipient_id: ProfileId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND NOT is_read")
            .bind(recipient_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self), err)]
    pub async fn count_unread_all(&mut self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE NOT is_read")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self), err)]
    pub async fn count_all(&mut self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages").fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Creation timestamps of the newest `limit` messages, newest first.
    #[instrument(skip(self), err)]
    pub async fn recent_timestamps(&mut self, limit: i64) -> Result<Vec<DateTime<Utc>>> {
        let timestamps = sqlx::query_scalar::<_, DateTime<Utc>>("SELECT created_at FROM messages ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(timestamps)
    }

    #[instrument(skip(self), fields(physician_id = %abbrev_uuid(&physician_id)), err)]
    pub async fn unread_physician_messages(&mut self, physician_id: PhysicianId) -> Result<Vec<PhysicianMessageWithNames>> {
        let messages = sqlx::query_as::<_, PhysicianMessageWithNames>(
            r#"
            SELECT pm.*,
                   s.first_name AS sender_first_name, s.last_name AS sender_last_name,
                   pp.first_name AS patient_first_name, pp.last_name AS patient_last_name
            FROM physician_messages pm
            JOIN profiles s ON s.id = pm.sender_id
            LEFT JOIN patients pt ON pt.id = pm.patient_id
            LEFT JOIN profiles pp ON pp.id = pt.profile_id
            WHERE pm.physician_id = $1 AND NOT pm.is_read
            ORDER BY pm.created_at DESC
            "#,
        )
        .bind(physician_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::models::profiles::Role, test_utils::create_test_user};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn only_the_recipient_can_mark_read(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut messages = Messages::new(&mut conn);

        let message = messages
            .create(&MessageCreateDBRequest {
                sender_id: patient.id,
                recipient_id: clinician.id,
                subject: Some("Dressing change".to_string()),
                body: "Can we move tomorrow's visit?".to_string(),
                parent_message_id: None,
                patient_context_id: None,
            })
            .await
            .unwrap();

        assert_eq!(messages.count_unread(clinician.id).await.unwrap(), 1);
        assert!(!messages.mark_read(message.id, patient.id).await.unwrap());
        assert!(messages.mark_read(message.id, clinician.id).await.unwrap());
        assert!(!messages.mark_read(message.id, clinician.id).await.unwrap());
        assert_eq!(messages.count_unread(clinician.id).await.unwrap(), 0);

        let inbox = messages.inbox(clinician.id, 0, 10).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sender_role, Role::Patient);
        assert!(inbox[0].message.read_at.is_some());
        assert_eq!(messages.sent(patient.id, 0, 10).await.unwrap().len(), 1);
    }
}
