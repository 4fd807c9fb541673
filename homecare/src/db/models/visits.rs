//! Database models for visits and visit ratings.

use crate::types::{ClinicianId, PatientId, ProfileId, VisitId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "visit_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    Nursing,
    PhysicalTherapy,
    OccupationalTherapy,
    SpeechTherapy,
    Aide,
    Other,
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitType::Nursing => "nursing",
            VisitType::PhysicalTherapy => "physical_therapy",
            VisitType::OccupationalTherapy => "occupational_therapy",
            VisitType::SpeechTherapy => "speech_therapy",
            VisitType::Aide => "aide",
            VisitType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "visit_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
    EnRoute,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::EnRoute => "en_route",
            VisitStatus::InProgress => "in_progress",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
            VisitStatus::NoShow => "no_show",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VisitStatus::Completed | VisitStatus::Cancelled | VisitStatus::NoShow)
    }

    /// The visit workflow: scheduled -> en_route -> in_progress -> completed, with cancellation
    /// or no-show possible until the clinician has started the visit.
    pub fn can_transition_to(&self, next: VisitStatus) -> bool {
        use VisitStatus::*;
        matches!(
            (self, next),
            (Scheduled, EnRoute)
                | (EnRoute, InProgress)
                | (InProgress, Completed)
                | (Scheduled | EnRoute, Cancelled)
                | (Scheduled | EnRoute, NoShow)
        )
    }

    /// Documentation closes a visit, so it is refused once the visit was cancelled or missed.
    pub fn can_document(&self) -> bool {
        !matches!(self, VisitStatus::Cancelled | VisitStatus::NoShow)
    }
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct VisitCreateDBRequest {
    pub patient_id: PatientId,
    pub clinician_id: ClinicianId,
    pub visit_type: VisitType,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub visit_notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VisitUpdateDBRequest {
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub visit_notes: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct VisitDBResponse {
    pub id: VisitId,
    pub patient_id: PatientId,
    pub clinician_id: ClinicianId,
    pub visit_type: VisitType,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub status: VisitStatus,
    pub visit_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A visit joined with the names the schedule views show.
#[derive(Debug, Clone, FromRow)]
pub struct VisitWithNames {
    #[sqlx(flatten)]
    pub visit: VisitDBResponse,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_address: Option<String>,
    pub patient_city: Option<String>,
    pub primary_diagnosis: Option<String>,
    pub clinician_first_name: String,
    pub clinician_last_name: String,
    pub clinician_specialization: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    ExcellentCare,
    OnTime,
    Professional,
    ClearCommunication,
    ListenedWell,
    LateArrival,
    RushedVisit,
    UnclearInstructions,
    EquipmentIssues,
}

impl FeedbackCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackCategory::ExcellentCare => "excellent_care",
            FeedbackCategory::OnTime => "on_time",
            FeedbackCategory::Professional => "professional",
            FeedbackCategory::ClearCommunication => "clear_communication",
            FeedbackCategory::ListenedWell => "listened_well",
            FeedbackCategory::LateArrival => "late_arrival",
            FeedbackCategory::RushedVisit => "rushed_visit",
            FeedbackCategory::UnclearInstructions => "unclear_instructions",
            FeedbackCategory::EquipmentIssues => "equipment_issues",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisitRatingCreateDBRequest {
    pub visit_id: VisitId,
    pub patient_id: PatientId,
    pub rated_by: ProfileId,
    pub overall_rating: i16,
    pub care_quality_rating: Option<i16>,
    pub communication_rating: Option<i16>,
    pub professionalism_rating: Option<i16>,
    pub timeliness_rating: Option<i16>,
    pub feedback_text: Option<String>,
    pub feedback_categories: Vec<String>,
    pub would_recommend: Option<bool>,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct VisitRatingDBResponse {
    pub id: Uuid,
    pub visit_id: VisitId,
    pub patient_id: PatientId,
    pub rated_by: ProfileId,
    pub overall_rating: i16,
    pub care_quality_rating: Option<i16>,
    pub communication_rating: Option<i16>,
    pub professionalism_rating: Option<i16>,
    pub timeliness_rating: Option<i16>,
    pub feedback_text: Option<String>,
    pub feedback_categories: Vec<String>,
    pub would_recommend: Option<bool>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use VisitStatus::*;

    const ALL: [VisitStatus; 6] = [Scheduled, EnRoute, InProgress, Completed, Cancelled, NoShow];

    #[test]
    fn happy_path_is_linear() {
        assert!(Scheduled.can_transition_to(EnRoute));
        assert!(EnRoute.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!Scheduled.can_transition_to(InProgress));
        assert!(!Scheduled.can_transition_to(Completed));
    }

    #[test]
    fn cancellation_only_before_the_visit_starts() {
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(EnRoute.can_transition_to(NoShow));
        assert!(!InProgress.can_transition_to(Cancelled));
        assert!(!InProgress.can_transition_to(NoShow));
    }

    #[test]
    fn terminal_states_are_final() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn no_self_transitions() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn cancelled_and_missed_visits_cannot_be_documented() {
        assert!(InProgress.can_document());
        assert!(Completed.can_document());
        assert!(!Cancelled.can_document());
        assert!(!NoShow.can_document());
    }
}
