//! Database models for direct messages and physician messages.

use crate::api::models::profiles::Role;
use crate::types::{MessageId, PatientId, PhysicianId, ProfileId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MessageCreateDBRequest {
    pub sender_id: ProfileId,
    pub recipient_id: ProfileId,
    pub subject: Option<String>,
    pub body: String,
    pub parent_message_id: Option<MessageId>,
    pub patient_context_id: Option<PatientId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageDBResponse {
    pub id: MessageId,
    pub sender_id: ProfileId,
    pub recipient_id: ProfileId,
    pub subject: Option<String>,
    pub body: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub parent_message_id: Option<MessageId>,
    pub patient_context_id: Option<PatientId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageDBResponse {
    /// Subject line for a reply to this message.
    pub fn reply_subject(&self) -> String {
        match self.subject.as_deref().map(str::trim) {
            Some(subject) if !subject.is_empty() => format!("Re: {subject}"),
            _ => "Re: No subject".to_string(),
        }
    }
}

/// A message with both participants' names.
#[derive(Debug, Clone, FromRow)]
pub struct MessageWithParticipants {
    #[sqlx(flatten)]
    pub message: MessageDBResponse,
    pub sender_first_name: String,
    pub sender_last_name: String,
    pub sender_role: Role,
    pub recipient_first_name: String,
    pub recipient_last_name: String,
    pub recipient_role: Role,
}

#[derive(Debug, Clone, FromRow)]
pub struct PhysicianMessageDBResponse {
    pub id: Uuid,
    pub physician_id: PhysicianId,
    pub sender_id: ProfileId,
    pub patient_id: Option<PatientId>,
    pub subject: Option<String>,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A physician message with sender and patient names for the physician dashboard.
#[derive(Debug, Clone, FromRow)]
pub struct PhysicianMessageWithNames {
    #[sqlx(flatten)]
    pub message: PhysicianMessageDBResponse,
    pub sender_first_name: String,
    pub sender_last_name: String,
    pub patient_first_name: Option<String>,
    pub patient_last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: Option<&str>) -> MessageDBResponse {
        MessageDBResponse {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            subject: subject.map(str::to_string),
            body: "Hello".to_string(),
            is_read: false,
            read_at: None,
            parent_message_id: None,
            patient_context_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn reply_subject_prefixes_original() {
        assert_eq!(message(Some("Medication question")).reply_subject(), "Re: Medication question");
    }

    #[test]
    fn reply_subject_falls_back_when_missing_or_blank() {
        assert_eq!(message(None).reply_subject(), "Re: No subject");
        assert_eq!(message(Some("  ")).reply_subject(), "Re: No subject");
    }
}
