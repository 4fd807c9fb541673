//! Database models for patient alerts.

use crate::types::{AlertId, PatientId, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "alert_severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl AlertSeverity {
    /// Sort rank, most urgent first.
    pub fn rank(&self) -> u8 {
        match self {
            AlertSeverity::Critical => 0,
            AlertSeverity::High => 1,
            AlertSeverity::Medium => 2,
            AlertSeverity::Low => 3,
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, AlertSeverity::Critical | AlertSeverity::High)
    }
}

#[derive(Debug, Clone)]
pub struct AlertCreateDBRequest {
    pub patient_id: PatientId,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub created_by: ProfileId,
}

#[derive(Debug, Clone, FromRow)]
pub struct AlertDBResponse {
    pub id: AlertId,
    pub patient_id: PatientId,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub created_by: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<ProfileId>,
}

impl AlertDBResponse {
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AlertWithPatient {
    #[sqlx(flatten)]
    pub alert: AlertDBResponse,
    pub patient_first_name: String,
    pub patient_last_name: String,
}

impl AlertWithPatient {
    pub fn patient_name(&self) -> String {
        format!("{} {}", self.patient_first_name, self.patient_last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_ranks_first() {
        let mut severities = vec![AlertSeverity::Low, AlertSeverity::Critical, AlertSeverity::Medium, AlertSeverity::High];
        severities.sort_by_key(AlertSeverity::rank);
        assert_eq!(
            severities,
            vec![AlertSeverity::Critical, AlertSeverity::High, AlertSeverity::Medium, AlertSeverity::Low]
        );
        assert!(AlertSeverity::High.is_urgent());
        assert!(!AlertSeverity::Medium.is_urgent());
    }
}
