//! API models for care plans and their goals.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    aggregation,
    db::models::care_plans::{CarePlanDBResponse, CarePlanStatus, GoalDBResponse, GoalStatus, GoalUpdateDBRequest},
    errors::Error,
    types::{CarePlanId, GoalId, PatientId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GoalResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: GoalId,
    #[schema(value_type = String, format = "uuid")]
    pub care_plan_id: CarePlanId,
    pub description: String,
    pub target_date: Option<NaiveDate>,
    pub status: GoalStatus,
    pub progress: i16,
    pub updated_at: DateTime<Utc>,
}

impl From<GoalDBResponse> for GoalResponse {
    fn from(db: GoalDBResponse) -> Self {
        Self {
            id: db.id,
            care_plan_id: db.care_plan_id,
            description: db.description,
            target_date: db.target_date,
            status: db.status,
            progress: db.progress,
            updated_at: db.updated_at,
        }
    }
}

/// A care plan, its goals, and the share of goals completed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarePlanResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CarePlanId,
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    pub title: String,
    pub description: Option<String>,
    pub status: CarePlanStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub goals: Vec<GoalResponse>,
    /// Completed goals as a percentage of all goals
    pub progress: i64,
    pub created_at: DateTime<Utc>,
}

impl CarePlanResponse {
    /// `goals` may hold goals of other plans; only this plan's are kept.
    pub fn with_goals(plan: CarePlanDBResponse, goals: &[GoalDBResponse]) -> Self {
        let goals: Vec<GoalResponse> = goals
            .iter()
            .filter(|g| g.care_plan_id == plan.id)
            .cloned()
            .map(GoalResponse::from)
            .collect();
        let progress = aggregation::care_plan_progress(goals.iter().map(|g| &g.status));
        Self {
            id: plan.id,
            patient_id: plan.patient_id,
            title: plan.title,
            description: plan.description,
            status: plan.status,
            start_date: plan.start_date,
            end_date: plan.end_date,
            goals,
            progress,
            created_at: plan.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarePlanCreate {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: CarePlanStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Goals created together with the plan
    #[serde(default)]
    pub goals: Vec<GoalCreate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GoalCreate {
    pub description: String,
    pub target_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GoalUpdate {
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub status: Option<GoalStatus>,
    /// 0 to 100
    pub progress: Option<i16>,
}

impl GoalUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(progress) = self.progress
            && !(0..=100).contains(&progress)
        {
            return Err(Error::BadRequest {
                message: "progress must be between 0 and 100".to_string(),
            });
        }
        Ok(())
    }
}

impl From<GoalUpdate> for GoalUpdateDBRequest {
    fn from(api: GoalUpdate) -> Self {
        Self {
            description: api.description,
            target_date: api.target_date,
            status: api.status,
            progress: api.progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn plan() -> CarePlanDBResponse {
        CarePlanDBResponse {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            title: "Post-surgery recovery".to_string(),
            description: None,
            status: CarePlanStatus::Active,
            start_date: None,
            end_date: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn goal(plan_id: CarePlanId, status: GoalStatus) -> GoalDBResponse {
        GoalDBResponse {
            id: Uuid::new_v4(),
            care_plan_id: plan_id,
            description: "Walk unaided".to_string(),
            target_date: None,
            status,
            progress: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn plan_keeps_only_its_own_goals_and_reports_progress() {
        let plan = plan();
        let goals = vec![
            goal(plan.id, GoalStatus::Completed),
            goal(plan.id, GoalStatus::InProgress),
            goal(plan.id, GoalStatus::Completed),
            goal(plan.id, GoalStatus::NotStarted),
            goal(Uuid::new_v4(), GoalStatus::Completed),
        ];
        let response = CarePlanResponse::with_goals(plan, &goals);
        assert_eq!(response.goals.len(), 4);
        assert_eq!(response.progress, 50);
    }

    #[test]
    fn plan_without_goals_has_zero_progress() {
        assert_eq!(CarePlanResponse::with_goals(plan(), &[]).progress, 0);
    }

    #[test]
    fn goal_progress_is_a_percentage() {
        let ok = GoalUpdate {
            progress: Some(100),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
        let bad = GoalUpdate {
            progress: Some(101),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
