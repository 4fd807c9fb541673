//! Database repository for care plans and goals.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::{DbError, Result},
        models::care_plans::{CarePlanCreateDBRequest, CarePlanDBResponse, CarePlanStatus, GoalCreateDBRequest, GoalDBResponse, GoalUpdateDBRequest},
    },
    types::{CarePlanId, GoalId, PatientId, abbrev_uuid},
};

pub struct CarePlans<'c> {
    db: &'c mut PgConnection,
}

impl<'c> CarePlans<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(patient_id = %abbrev_uuid(&request.patient_id)), err)]
    pub async fn create(&mut self, request: &CarePlanCreateDBRequest) -> Result<CarePlanDBResponse> {
        let plan = sqlx::query_as::<_, CarePlanDBResponse>(
            r#"
            INSERT INTO care_plans (patient_id, title, description, status, start_date, end_date, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.patient_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.status)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(plan)
    }

    #[instrument(skip(self), fields(care_plan_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: CarePlanId) -> Result<Option<CarePlanDBResponse>> {
        let plan = sqlx::query_as::<_, CarePlanDBResponse>("SELECT * FROM care_plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(plan)
    }

    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id)), err)]
    pub async fn list_for_patient(&mut self, patient_id: PatientId) -> Result<Vec<CarePlanDBResponse>> {
        let plans = sqlx::query_as::<_, CarePlanDBResponse>("SELECT * FROM care_plans WHERE patient_id = $1 ORDER BY created_at DESC")
            .bind(patient_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(plans)
    }

    /// Plans in `status` across `patient_ids`, or across every patient when None.
    #[instrument(skip(self, patient_ids), err)]
    pub async fn count_with_status(&mut self, patient_ids: Option<&[PatientId]>, status: CarePlanStatus) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM care_plans WHERE status = $1 AND ($2::uuid[] IS NULL OR patient_id = ANY($2))",
        )
        .bind(status)
        .bind(patient_ids)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(care_plan_id = %abbrev_uuid(&request.care_plan_id)), err)]
    pub async fn create_goal(&mut self, request: &GoalCreateDBRequest) -> Result<GoalDBResponse> {
        let goal = sqlx::query_as::<_, GoalDBResponse>(
            r#"
            INSERT INTO care_plan_goals (care_plan_id, description, target_date)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.care_plan_id)
        .bind(&request.description)
        .bind(request.target_date)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(goal)
    }

    #[instrument(skip(self), fields(goal_id = %abbrev_uuid(&id)), err)]
    pub async fn get_goal(&mut self, id: GoalId) -> Result<Option<GoalDBResponse>> {
        let goal = sqlx::query_as::<_, GoalDBResponse>("SELECT * FROM care_plan_goals WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(goal)
    }

    /// Marking a goal completed also sets its progress to 100.
    #[instrument(skip(self, request), fields(goal_id = %abbrev_uuid(&id)), err)]
    pub async fn update_goal(&mut self, id: GoalId, request: &GoalUpdateDBRequest) -> Result<GoalDBResponse> {
        let goal = sqlx::query_as::<_, GoalDBResponse>(
            r#"
            UPDATE care_plan_goals SET
                description = COALESCE($2, description),
                target_date = COALESCE($3, target_date),
                status = COALESCE($4, status),
                progress = CASE WHEN $4 = 'completed'::goal_status THEN 100 ELSE COALESCE($5, progress) END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.description)
        .bind(request.target_date)
        .bind(request.status)
        .bind(request.progress)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(goal)
    }

    #[instrument(skip(self, plan_ids), fields(count = plan_ids.len()), err)]
    pub async fn goals_for_plans(&mut self, plan_ids: &[CarePlanId]) -> Result<Vec<GoalDBResponse>> {
        let goals = sqlx::query_as::<_, GoalDBResponse>("SELECT * FROM care_plan_goals WHERE care_plan_id = ANY($1) ORDER BY created_at")
            .bind(plan_ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(goals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::profiles::Role,
        db::models::care_plans::GoalStatus,
        test_utils::{create_test_user, role_record_ids},
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn completing_a_goal_sets_full_progress(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let mut plans = CarePlans::new(&mut conn);

        let plan = plans
            .create(&CarePlanCreateDBRequest {
                patient_id,
                title: "Post-surgery recovery".to_string(),
                description: None,
                status: CarePlanStatus::Active,
                start_date: None,
                end_date: None,
                created_by: clinician.id,
            })
            .await
            .unwrap();
        let goal = plans
            .create_goal(&GoalCreateDBRequest {
                care_plan_id: plan.id,
                description: "Walk 500m unaided".to_string(),
                target_date: None,
            })
            .await
            .unwrap();
        assert_eq!(goal.status, GoalStatus::NotStarted);

        let partial = plans
            .update_goal(
                goal.id,
                &GoalUpdateDBRequest {
                    status: Some(GoalStatus::InProgress),
                    progress: Some(40),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(partial.progress, 40);

        let done = plans
            .update_goal(
                goal.id,
                &GoalUpdateDBRequest {
                    status: Some(GoalStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(done.progress, 100);

        assert_eq!(plans.count_with_status(Some(&[patient_id]), CarePlanStatus::Active).await.unwrap(), 1);
        assert_eq!(plans.count_with_status(Some(&[]), CarePlanStatus::Active).await.unwrap(), 0);
        assert_eq!(plans.goals_for_plans(&[plan.id]).await.unwrap().len(), 1);
    }
}
