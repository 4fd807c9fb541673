//! API models for visits and visit ratings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use super::pagination::Pagination;
use crate::{
    db::models::visits::{FeedbackCategory, VisitDBResponse, VisitRatingDBResponse, VisitStatus, VisitType, VisitWithNames},
    errors::Error,
    types::{ClinicianId, PatientId, ProfileId, VisitId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: VisitId,
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    #[schema(value_type = String, format = "uuid")]
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

impl From<VisitDBResponse> for VisitResponse {
    fn from(db: VisitDBResponse) -> Self {
        Self {
            id: db.id,
            patient_id: db.patient_id,
            clinician_id: db.clinician_id,
            visit_type: db.visit_type,
            scheduled_start: db.scheduled_start,
            scheduled_end: db.scheduled_end,
            actual_start: db.actual_start,
            actual_end: db.actual_end,
            status: db.status,
            visit_notes: db.visit_notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// A visit with the patient and clinician names the schedule views show.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitDetailResponse {
    #[serde(flatten)]
    pub visit: VisitResponse,
    pub patient_name: String,
    pub patient_address: Option<String>,
    pub patient_city: Option<String>,
    pub primary_diagnosis: Option<String>,
    pub clinician_name: String,
    pub clinician_specialization: String,
}

impl From<VisitWithNames> for VisitDetailResponse {
    fn from(row: VisitWithNames) -> Self {
        Self {
            visit: row.visit.into(),
            patient_name: format!("{} {}", row.patient_first_name, row.patient_last_name),
            patient_address: row.patient_address,
            patient_city: row.patient_city,
            primary_diagnosis: row.primary_diagnosis,
            clinician_name: format!("{} {}", row.clinician_first_name, row.clinician_last_name),
            clinician_specialization: row.clinician_specialization,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitCreate {
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    /// Defaults to the calling clinician; agency admins must set it
    #[schema(value_type = Option<String>, format = "uuid")]
    pub clinician_id: Option<ClinicianId>,
    pub visit_type: VisitType,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub visit_notes: Option<String>,
}

impl VisitCreate {
    pub fn validate(&self) -> Result<(), Error> {
        if self.scheduled_end <= self.scheduled_start {
            return Err(Error::BadRequest {
                message: "Visit must end after it starts".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitStatusUpdate {
    pub status: VisitStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitDocumentation {
    pub visit_notes: String,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListVisitsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[schema(value_type = Option<String>, format = "uuid")]
    #[param(value_type = Option<String>, format = "uuid")]
    pub patient_id: Option<PatientId>,

    pub status: Option<VisitStatus>,

    /// Only visits starting at or after this instant
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub from: Option<DateTime<Utc>>,

    /// Only visits starting before this instant
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitRatingCreate {
    /// 1 to 5
    pub overall_rating: i16,
    pub care_quality_rating: Option<i16>,
    pub communication_rating: Option<i16>,
    pub professionalism_rating: Option<i16>,
    pub timeliness_rating: Option<i16>,
    pub feedback_text: Option<String>,
    #[serde(default)]
    pub feedback_categories: Vec<FeedbackCategory>,
    pub would_recommend: Option<bool>,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl VisitRatingCreate {
    pub fn validate(&self) -> Result<(), Error> {
        let scores = [
            ("overall_rating", Some(self.overall_rating)),
            ("care_quality_rating", self.care_quality_rating),
            ("communication_rating", self.communication_rating),
            ("professionalism_rating", self.professionalism_rating),
            ("timeliness_rating", self.timeliness_rating),
        ];
        for (field, score) in scores {
            if let Some(score) = score
                && !(1..=5).contains(&score)
            {
                return Err(Error::BadRequest {
                    message: format!("{field} must be between 1 and 5"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitRatingResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: uuid::Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub visit_id: VisitId,
    /// Hidden when the rating was left anonymously
    #[schema(value_type = Option<String>, format = "uuid")]
    pub rated_by: Option<ProfileId>,
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

impl From<VisitRatingDBResponse> for VisitRatingResponse {
    fn from(db: VisitRatingDBResponse) -> Self {
        Self {
            id: db.id,
            visit_id: db.visit_id,
            rated_by: (!db.is_anonymous).then_some(db.rated_by),
            overall_rating: db.overall_rating,
            care_quality_rating: db.care_quality_rating,
            communication_rating: db.communication_rating,
            professionalism_rating: db.professionalism_rating,
            timeliness_rating: db.timeliness_rating,
            feedback_text: db.feedback_text,
            feedback_categories: db.feedback_categories,
            would_recommend: db.would_recommend,
            is_anonymous: db.is_anonymous,
            created_at: db.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rating(overall: i16) -> VisitRatingCreate {
        VisitRatingCreate {
            overall_rating: overall,
            care_quality_rating: None,
            communication_rating: Some(4),
            professionalism_rating: None,
            timeliness_rating: None,
            feedback_text: None,
            feedback_categories: vec![FeedbackCategory::OnTime],
            would_recommend: Some(true),
            is_anonymous: false,
        }
    }

    #[test]
    fn ratings_must_be_one_to_five() {
        assert!(rating(5).validate().is_ok());
        assert!(rating(0).validate().is_err());
        assert!(rating(6).validate().is_err());

        let mut r = rating(3);
        r.timeliness_rating = Some(9);
        assert!(r.validate().is_err());
    }

    #[test]
    fn visit_must_end_after_start() {
        let start = Utc::now();
        let mut create = VisitCreate {
            patient_id: uuid::Uuid::new_v4(),
            clinician_id: None,
            visit_type: VisitType::Nursing,
            scheduled_start: start,
            scheduled_end: start,
            visit_notes: None,
        };
        assert!(create.validate().is_err());
        create.scheduled_end = start + Duration::hours(1);
        assert!(create.validate().is_ok());
    }

    #[test]
    fn anonymous_ratings_hide_the_rater() {
        let db = VisitRatingDBResponse {
            id: uuid::Uuid::new_v4(),
            visit_id: uuid::Uuid::new_v4(),
            patient_id: uuid::Uuid::new_v4(),
            rated_by: uuid::Uuid::new_v4(),
            overall_rating: 4,
            care_quality_rating: None,
            communication_rating: None,
            professionalism_rating: None,
            timeliness_rating: None,
            feedback_text: None,
            feedback_categories: vec![],
            would_recommend: None,
            is_anonymous: true,
            created_at: Utc::now(),
        };
        assert_eq!(VisitRatingResponse::from(db).rated_by, None);
    }
}
