//! API models for direct messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{pagination::Pagination, profiles::Role};
use crate::{
    db::models::messages::{MessageDBResponse, MessageWithParticipants},
    types::{MessageId, PatientId, ProfileId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MessageId,
    #[schema(value_type = String, format = "uuid")]
    pub sender_id: ProfileId,
    #[schema(value_type = String, format = "uuid")]
    pub recipient_id: ProfileId,
    pub subject: Option<String>,
    pub body: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub parent_message_id: Option<MessageId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub patient_context_id: Option<PatientId>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageDBResponse> for MessageResponse {
    fn from(db: MessageDBResponse) -> Self {
        Self {
            id: db.id,
            sender_id: db.sender_id,
            recipient_id: db.recipient_id,
            subject: db.subject,
            body: db.body,
            is_read: db.is_read,
            read_at: db.read_at,
            parent_message_id: db.parent_message_id,
            patient_context_id: db.patient_context_id,
            created_at: db.created_at,
        }
    }
}

/// A message with the names and roles of both parties.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageDetailResponse {
    #[serde(flatten)]
    pub message: MessageResponse,
    pub sender_name: String,
    pub sender_role: Role,
    pub recipient_name: String,
    pub recipient_role: Role,
}

impl From<MessageWithParticipants> for MessageDetailResponse {
    fn from(row: MessageWithParticipants) -> Self {
        Self {
            message: row.message.into(),
            sender_name: format!("{} {}", row.sender_first_name, row.sender_last_name),
            sender_role: row.sender_role,
            recipient_name: format!("{} {}", row.recipient_first_name, row.recipient_last_name),
            recipient_role: row.recipient_role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageCreate {
    #[schema(value_type = String, format = "uuid")]
    pub recipient_id: ProfileId,
    pub subject: Option<String>,
    pub body: String,
    /// Patient the conversation is about, if any
    #[schema(value_type = Option<String>, format = "uuid")]
    pub patient_context_id: Option<PatientId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageReply {
    pub body: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageFolder {
    #[default]
    Inbox,
    Sent,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListMessagesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// `inbox` (default) or `sent`
    #[serde(default)]
    pub folder: MessageFolder,
}
