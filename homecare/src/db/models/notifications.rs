//! Database models for in-app notifications.

use crate::api::models::profiles::Role;
use crate::db::models::visits::{VisitStatus, VisitType};
use crate::types::{NotificationId, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default, ToSchema)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    VisitReminder,
    VisitUpdate,
    Message,
    Document,
    CarePlanUpdate,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default, ToSchema)]
#[sqlx(type_name = "notification_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone)]
pub struct NotificationCreateDBRequest {
    pub user_id: ProfileId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub action_url: Option<String>,
}

impl NotificationCreateDBRequest {
    /// The notice an existing profile gets when someone invites them.
    pub fn new_invitation(user_id: ProfileId, inviter_role: Role) -> Self {
        Self {
            user_id,
            title: "New Invitation".to_string(),
            message: format!("You have received an invitation from a {inviter_role}"),
            notification_type: NotificationType::System,
            priority: NotificationPriority::Normal,
            action_url: Some("/dashboard/invitations".to_string()),
        }
    }

    pub fn new_message(user_id: ProfileId, sender_name: &str) -> Self {
        Self {
            user_id,
            title: "New Message".to_string(),
            message: format!("You have a new message from {sender_name}"),
            notification_type: NotificationType::Message,
            priority: NotificationPriority::Normal,
            action_url: Some("/dashboard/messages".to_string()),
        }
    }

    pub fn care_plan_update(user_id: ProfileId, title: &str) -> Self {
        Self {
            user_id,
            title: "Care Plan Update".to_string(),
            message: format!("Your care plan \"{title}\" was updated"),
            notification_type: NotificationType::CarePlanUpdate,
            priority: NotificationPriority::Normal,
            action_url: Some("/dashboard/care-plans".to_string()),
        }
    }

    pub fn visit_update(user_id: ProfileId, visit_type: VisitType, status: VisitStatus) -> Self {
        let priority = match status {
            VisitStatus::Cancelled | VisitStatus::NoShow => NotificationPriority::High,
            _ => NotificationPriority::Normal,
        };
        Self {
            user_id,
            title: "Visit Update".to_string(),
            message: format!("Your {} visit is now {}", visit_type.as_str().replace('_', " "), status.as_str().replace('_', " ")),
            notification_type: NotificationType::VisitUpdate,
            priority,
            action_url: Some("/dashboard/visits".to_string()),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationDBResponse {
    pub id: NotificationId,
    pub user_id: ProfileId,
    pub title: String,
    pub message: String,
    #[sqlx(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
