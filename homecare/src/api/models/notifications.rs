//! API models for in-app notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use super::pagination::Pagination;
use crate::{
    db::models::notifications::{NotificationDBResponse, NotificationPriority, NotificationType},
    types::NotificationId,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationDBResponse> for NotificationResponse {
    fn from(db: NotificationDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            message: db.message,
            notification_type: db.notification_type,
            priority: db.priority,
            is_read: db.is_read,
            read_at: db.read_at,
            action_url: db.action_url,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub unread_count: i64,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListNotificationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only unread notifications (default: false)
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub unread_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub marked: u64,
}
