//! Page models returned by the role-gated page loaders.
//!
//! Each struct is everything one portal page renders, fetched in a single request.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{
    alerts::AlertResponse,
    messages::MessageDetailResponse,
    profiles::{ProfileResponse, Role},
    visits::VisitDetailResponse,
};
use crate::{
    aggregation::{Bar, GroupCount},
    db::models::{
        analytics::AdminCounts,
        audit_logs::AuditLogWithActor,
        messages::PhysicianMessageWithNames,
        orders::{DmeOrderStatus, DmeOrderWithPatient, MedicalOrderStatus, MedicalOrderWithPatient},
    },
    types::{PatientId, ProfileId},
};

/// `GET /dashboard`, open to every role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardPage {
    pub profile: ProfileResponse,
    /// Patients whose records feed this page
    #[schema(value_type = Vec<String>)]
    pub patient_ids: Vec<PatientId>,
    pub pending_invitations: i64,
    pub upcoming_visits: Vec<VisitDetailResponse>,
    pub recent_messages: Vec<MessageDetailResponse>,
    pub unread_messages: i64,
    pub active_care_plans: i64,
    pub documents: i64,
}

/// A patient seen today, with their unresolved alerts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatientSnapshot {
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    pub patient_name: String,
    pub primary_diagnosis: Option<String>,
    pub alerts: Vec<AlertResponse>,
}

/// `GET /dashboard/clinician`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClinicianDashboardPage {
    pub profile: ProfileResponse,
    pub specialization: String,
    pub todays_visits: Vec<VisitDetailResponse>,
    pub upcoming_visit_count: i64,
    pub active_patient_count: i64,
    pub unread_messages: i64,
    /// Unresolved critical and high alerts across assigned patients
    pub urgent_alert_count: i64,
    pub patient_snapshots: Vec<PatientSnapshot>,
    pub recent_alerts: Vec<AlertResponse>,
}

/// One row of the admin activity feed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: uuid::Uuid,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub actor_id: Option<ProfileId>,
    pub actor_name: Option<String>,
    pub action: String,
    pub entity_type: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub entity_id: Option<uuid::Uuid>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLogWithActor> for AuditLogResponse {
    fn from(row: AuditLogWithActor) -> Self {
        let actor_name = match (row.actor_first_name, row.actor_last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}").trim().to_string()),
            (Some(first), None) => Some(first),
            _ => None,
        };
        let log = row.log;
        Self {
            id: log.id,
            actor_id: log.actor_id,
            actor_name,
            action: log.action,
            entity_type: log.entity_type,
            entity_id: log.entity_id,
            details: log.details,
            created_at: log.created_at,
        }
    }
}

/// `GET /dashboard/admin`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminDashboardPage {
    pub profile: ProfileResponse,
    pub counts: AdminCounts,
    pub recent_activity: Vec<AuditLogResponse>,
}

/// A chart bar; `width` is a percentage of the largest bar in the same chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChartBar {
    pub label: String,
    pub count: usize,
    pub width: f64,
}

impl ChartBar {
    pub fn from_bars<K, F>(bars: Vec<Bar<K>>, label: F) -> Vec<ChartBar>
    where
        F: Fn(&K) -> String,
    {
        bars.into_iter()
            .map(|bar| ChartBar {
                label: label(&bar.key),
                count: bar.count,
                width: bar.width,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

impl From<GroupCount<NaiveDate>> for DailyCount {
    fn from(group: GroupCount<NaiveDate>) -> Self {
        Self {
            date: group.key,
            count: group.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Metric {
    pub label: String,
    pub value: String,
}

impl Metric {
    pub fn new(label: &str, value: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

/// `GET /dashboard/admin/analytics`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsPage {
    pub total_visits: usize,
    pub completed_visits: usize,
    pub completion_rate: i64,
    pub visits_by_type: Vec<ChartBar>,
    pub visits_by_status: Vec<ChartBar>,
    /// Oldest day first
    pub message_volume: Vec<DailyCount>,
    pub patient_engagement: Vec<Metric>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MedicalOrderResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: uuid::Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    pub patient_name: String,
    pub order_type: String,
    pub description: Option<String>,
    pub status: MedicalOrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<MedicalOrderWithPatient> for MedicalOrderResponse {
    fn from(row: MedicalOrderWithPatient) -> Self {
        Self {
            id: row.order.id,
            patient_id: row.order.patient_id,
            patient_name: format!("{} {}", row.patient_first_name, row.patient_last_name),
            order_type: row.order.order_type,
            description: row.order.description,
            status: row.order.status,
            created_at: row.order.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PhysicianMessageResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: uuid::Uuid,
    pub sender_name: String,
    pub patient_name: Option<String>,
    pub subject: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<PhysicianMessageWithNames> for PhysicianMessageResponse {
    fn from(row: PhysicianMessageWithNames) -> Self {
        let patient_name = match (row.patient_first_name, row.patient_last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            _ => None,
        };
        Self {
            id: row.message.id,
            sender_name: format!("{} {}", row.sender_first_name, row.sender_last_name),
            patient_name,
            subject: row.message.subject,
            body: row.message.body,
            created_at: row.message.created_at,
        }
    }
}

/// `GET /physician/dashboard`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PhysicianDashboardPage {
    pub profile: ProfileResponse,
    pub pending_orders: Vec<MedicalOrderResponse>,
    pub unread_messages: Vec<PhysicianMessageResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DmeOrderResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: uuid::Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    pub patient_name: String,
    pub equipment_name: String,
    pub quantity: i32,
    pub status: DmeOrderStatus,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<DmeOrderWithPatient> for DmeOrderResponse {
    fn from(row: DmeOrderWithPatient) -> Self {
        Self {
            id: row.order.id,
            patient_id: row.order.patient_id,
            patient_name: format!("{} {}", row.patient_first_name, row.patient_last_name),
            equipment_name: row.order.equipment_name,
            quantity: row.order.quantity,
            status: row.order.status,
            estimated_delivery_date: row.order.estimated_delivery_date,
            created_at: row.order.created_at,
        }
    }
}

/// `GET /vendor/dashboard`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VendorDashboardPage {
    pub profile: ProfileResponse,
    pub company_name: Option<String>,
    pub pending_orders: Vec<DmeOrderResponse>,
    pub active_orders: Vec<DmeOrderResponse>,
}

/// Which dashboard a role lands on after sign-in.
pub fn home_path(role: Role) -> &'static str {
    match role {
        Role::Clinician => "/dashboard/clinician",
        Role::AgencyAdmin => "/dashboard/admin",
        Role::Physician => "/physician/dashboard",
        Role::Vendor => "/vendor/dashboard",
        Role::Patient | Role::Caregiver => "/dashboard",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{bars, group_counts};

    #[test]
    fn chart_bars_carry_labels_and_widths() {
        let rows = ["nursing", "aide", "nursing", "nursing"];
        let chart = ChartBar::from_bars(bars(group_counts(&rows, |r| *r)), |k| k.to_string());
        let labels: Vec<_> = chart.iter().map(|b| (b.label.as_str(), b.count)).collect();
        assert_eq!(labels, [("nursing", 3), ("aide", 1)]);
        assert_eq!(chart[0].width, 100.0);
        assert!((chart[1].width - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn every_role_has_a_home() {
        assert_eq!(home_path(Role::Clinician), "/dashboard/clinician");
        assert_eq!(home_path(Role::Caregiver), "/dashboard");
        assert_eq!(home_path(Role::Vendor), "/vendor/dashboard");
    }
}
