//! Aggregate counts for the agency admin dashboard.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct AdminCounts {
    pub patients: i64,
    pub clinicians: i64,
    pub caregivers: i64,
    pub scheduled_visits: i64,
    pub completed_visits: i64,
    pub unread_messages: i64,
    pub active_care_plans: i64,
}
