//! API models for patient alerts, plus the in-process filter and sort the alert views use.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::models::alerts::{AlertSeverity, AlertWithPatient},
    types::{AlertId, PatientId, ProfileId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AlertId,
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    pub patient_name: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub resolved_by: Option<ProfileId>,
}

impl From<AlertWithPatient> for AlertResponse {
    fn from(row: AlertWithPatient) -> Self {
        let patient_name = row.patient_name();
        let alert = row.alert;
        Self {
            id: alert.id,
            patient_id: alert.patient_id,
            patient_name,
            alert_type: alert.alert_type,
            severity: alert.severity,
            message: alert.message,
            created_at: alert.created_at,
            resolved_at: alert.resolved_at,
            resolved_by: alert.resolved_by,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertCreate {
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertSort {
    #[default]
    Newest,
    Oldest,
    /// Critical first, newest first within a severity
    Severity,
    /// Patient name A to Z
    Patient,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct AlertQuery {
    /// Case-insensitive match on the alert message or patient name
    pub search: Option<String>,
    pub severity: Option<AlertSeverity>,
    pub alert_type: Option<String>,
    #[serde(default)]
    pub sort: AlertSort,
}

impl AlertQuery {
    pub fn matches(&self, alert: &AlertResponse) -> bool {
        if let Some(severity) = self.severity
            && alert.severity != severity
        {
            return false;
        }
        if let Some(alert_type) = self.alert_type.as_deref().filter(|t| !t.is_empty())
            && alert.alert_type != alert_type
        {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let needle = needle.to_lowercase();
                alert.message.to_lowercase().contains(&needle) || alert.patient_name.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }

    /// Keep the alerts matching the query, ordered by its sort.
    pub fn apply(&self, alerts: Vec<AlertResponse>) -> Vec<AlertResponse> {
        let mut alerts: Vec<AlertResponse> = alerts.into_iter().filter(|a| self.matches(a)).collect();
        sort_alerts(&mut alerts, self.sort);
        alerts
    }
}

pub fn sort_alerts(alerts: &mut [AlertResponse], sort: AlertSort) {
    match sort {
        AlertSort::Newest => alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        AlertSort::Oldest => alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        AlertSort::Severity => alerts.sort_by(|a, b| {
            a.severity
                .rank()
                .cmp(&b.severity.rank())
                .then_with(|| b.created_at.cmp(&a.created_at))
        }),
        AlertSort::Patient => alerts.sort_by(|a, b| {
            a.patient_name
                .to_lowercase()
                .cmp(&b.patient_name.to_lowercase())
                .then_with(|| b.created_at.cmp(&a.created_at))
        }),
    }
}

/// Active and recently resolved alerts with the badge counts shown above them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertsResponse {
    pub active: Vec<AlertResponse>,
    pub resolved: Vec<AlertResponse>,
    pub critical_count: usize,
    pub high_count: usize,
    pub resolved_today: usize,
}

impl AlertsResponse {
    /// Counts are taken over the unfiltered active list so badges don't move with the search box.
    pub fn build(active: Vec<AlertResponse>, resolved: Vec<AlertResponse>, query: &AlertQuery, today: NaiveDate) -> Self {
        let critical_count = active.iter().filter(|a| a.severity == AlertSeverity::Critical).count();
        let high_count = active.iter().filter(|a| a.severity == AlertSeverity::High).count();
        let resolved_today = resolved
            .iter()
            .filter(|a| a.resolved_at.is_some_and(|at| at.date_naive() == today))
            .count();
        Self {
            active: query.apply(active),
            resolved: query.apply(resolved),
            critical_count,
            high_count,
            resolved_today,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn alert(patient: &str, severity: AlertSeverity, message: &str, age_hours: i64) -> AlertResponse {
        AlertResponse {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            patient_name: patient.to_string(),
            alert_type: "vitals".to_string(),
            severity,
            message: message.to_string(),
            created_at: Utc::now() - Duration::hours(age_hours),
            resolved_at: None,
            resolved_by: None,
        }
    }

    fn sample() -> Vec<AlertResponse> {
        vec![
            alert("Zoe Adams", AlertSeverity::Low, "Missed dose", 1),
            alert("amy Brown", AlertSeverity::Critical, "Blood pressure 190/120", 5),
            alert("Carl Diaz", AlertSeverity::High, "Fall reported", 3),
            alert("Beth Evans", AlertSeverity::Critical, "Oxygen saturation low", 2),
        ]
    }

    #[test]
    fn severity_sort_puts_critical_first_then_newest() {
        let mut alerts = sample();
        sort_alerts(&mut alerts, AlertSort::Severity);
        let order: Vec<_> = alerts.iter().map(|a| a.patient_name.as_str()).collect();
        assert_eq!(order, ["Beth Evans", "amy Brown", "Carl Diaz", "Zoe Adams"]);
    }

    #[test]
    fn newest_and_oldest_are_mirror_images() {
        let mut newest = sample();
        let mut oldest = newest.clone();
        sort_alerts(&mut newest, AlertSort::Newest);
        sort_alerts(&mut oldest, AlertSort::Oldest);
        oldest.reverse();
        let ids = |v: &[AlertResponse]| v.iter().map(|a| a.id).collect::<Vec<_>>();
        assert_eq!(ids(&newest), ids(&oldest));
        assert_eq!(newest[0].patient_name, "Zoe Adams");
    }

    #[test]
    fn patient_sort_ignores_case() {
        let mut alerts = sample();
        sort_alerts(&mut alerts, AlertSort::Patient);
        assert_eq!(alerts[0].patient_name, "amy Brown");
        assert_eq!(alerts[3].patient_name, "Zoe Adams");
    }

    #[test]
    fn search_matches_message_or_patient_name() {
        let query = AlertQuery {
            search: Some("FALL".to_string()),
            ..Default::default()
        };
        assert_eq!(query.apply(sample()).len(), 1);

        let query = AlertQuery {
            search: Some("evans".to_string()),
            ..Default::default()
        };
        let found = query.apply(sample());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "Oxygen saturation low");
    }

    #[test]
    fn severity_and_type_filters_combine() {
        let query = AlertQuery {
            severity: Some(AlertSeverity::Critical),
            alert_type: Some("vitals".to_string()),
            ..Default::default()
        };
        assert_eq!(query.apply(sample()).len(), 2);

        let query = AlertQuery {
            alert_type: Some("medication".to_string()),
            ..Default::default()
        };
        assert!(query.apply(sample()).is_empty());
    }

    #[test]
    fn badge_counts_ignore_the_search_filter() {
        let today = Utc::now().date_naive();
        let mut resolved = alert("Zoe Adams", AlertSeverity::Medium, "Resolved earlier", 30);
        resolved.resolved_at = Some(Utc::now());
        let query = AlertQuery {
            search: Some("no such alert".to_string()),
            ..Default::default()
        };

        let response = AlertsResponse::build(sample(), vec![resolved], &query, today);
        assert!(response.active.is_empty());
        assert_eq!(response.critical_count, 2);
        assert_eq!(response.high_count, 1);
        assert_eq!(response.resolved_today, 1);
    }
}
