//! Database repository for visits and visit ratings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, QueryBuilder};
use tracing::instrument;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::visits::{
            VisitCreateDBRequest, VisitDBResponse, VisitRatingCreateDBRequest, VisitRatingDBResponse, VisitStatus, VisitUpdateDBRequest,
            VisitWithNames,
        },
    },
    types::{ClinicianId, PatientId, VisitId, abbrev_uuid},
};

const VISIT_WITH_NAMES: &str = r#"
    SELECT v.*,
           pp.first_name AS patient_first_name, pp.last_name AS patient_last_name,
           pp.address AS patient_address, pp.city AS patient_city, pt.primary_diagnosis,
           cp.first_name AS clinician_first_name, cp.last_name AS clinician_last_name,
           c.specialization AS clinician_specialization
    FROM visits v
    JOIN patients pt ON pt.id = v.patient_id
    JOIN profiles pp ON pp.id = pt.profile_id
    JOIN clinicians c ON c.id = v.clinician_id
    JOIN profiles cp ON cp.id = c.profile_id
    WHERE 1=1
"#;

/// Filter for listing visits. `patient_ids: Some(vec![])` matches nothing.
#[derive(Debug, Clone)]
pub struct VisitFilter {
    pub skip: i64,
    pub limit: i64,
    pub patient_ids: Option<Vec<PatientId>>,
    pub clinician_id: Option<ClinicianId>,
    pub statuses: Option<Vec<VisitStatus>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub ascending: bool,
}

impl VisitFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            patient_ids: None,
            clinician_id: None,
            statuses: None,
            from: None,
            to: None,
            ascending: true,
        }
    }

    fn push_conditions<'a>(&'a self, query: &mut QueryBuilder<'a, sqlx::Postgres>) {
        if let Some(patient_ids) = &self.patient_ids {
            query.push(" AND v.patient_id = ANY(");
            query.push_bind(patient_ids);
            query.push(")");
        }
        if let Some(clinician_id) = self.clinician_id {
            query.push(" AND v.clinician_id = ");
            query.push_bind(clinician_id);
        }
        if let Some(statuses) = &self.statuses {
            query.push(" AND v.status::text = ANY(");
            query.push_bind(statuses.iter().map(|s| s.as_str().to_string()).collect::<Vec<_>>());
            query.push(")");
        }
        if let Some(from) = self.from {
            query.push(" AND v.scheduled_start >= ");
            query.push_bind(from);
        }
        if let Some(to) = self.to {
            query.push(" AND v.scheduled_start < ");
            query.push_bind(to);
        }
    }

    fn push_order_and_page<'a>(&'a self, query: &mut QueryBuilder<'a, sqlx::Postgres>) {
        query.push(if self.ascending {
            " ORDER BY v.scheduled_start ASC"
        } else {
            " ORDER BY v.scheduled_start DESC"
        });
        query.push(" LIMIT ");
        query.push_bind(self.limit);
        query.push(" OFFSET ");
        query.push_bind(self.skip);
    }
}

pub struct Visits<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Visits<'c> {
    type CreateRequest = VisitCreateDBRequest;
    type UpdateRequest = VisitUpdateDBRequest;
    type Response = VisitDBResponse;
    type Id = VisitId;
    type Filter = VisitFilter;

    #[instrument(skip(self, request), fields(patient_id = %abbrev_uuid(&request.patient_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let visit = sqlx::query_as::<_, VisitDBResponse>(
            r#"
            INSERT INTO visits (patient_id, clinician_id, visit_type, scheduled_start, scheduled_end, visit_notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.patient_id)
        .bind(request.clinician_id)
        .bind(request.visit_type)
        .bind(request.scheduled_start)
        .bind(request.scheduled_end)
        .bind(&request.visit_notes)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(visit)
    }

    #[instrument(skip(self), fields(visit_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let visit = sqlx::query_as::<_, VisitDBResponse>("SELECT * FROM visits WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(visit)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let visits = sqlx::query_as::<_, VisitDBResponse>("SELECT * FROM visits WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(visits.into_iter().map(|v| (v.id, v)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT v.* FROM visits v WHERE 1=1");
        filter.push_conditions(&mut query);
        filter.push_order_and_page(&mut query);
        let visits = query.build_query_as::<VisitDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(visits)
    }

    #[instrument(skip(self), fields(visit_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM visits WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(visit_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let visit = sqlx::query_as::<_, VisitDBResponse>(
            r#"
            UPDATE visits SET
                scheduled_start = COALESCE($2, scheduled_start),
                scheduled_end = COALESCE($3, scheduled_end),
                visit_notes = COALESCE($4, visit_notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.scheduled_start)
        .bind(request.scheduled_end)
        .bind(&request.visit_notes)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(visit)
    }
}

impl<'c> Visits<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list_with_names(&mut self, filter: &VisitFilter) -> Result<Vec<VisitWithNames>> {
        let mut query = QueryBuilder::new(VISIT_WITH_NAMES);
        filter.push_conditions(&mut query);
        filter.push_order_and_page(&mut query);
        let visits = query.build_query_as::<VisitWithNames>().fetch_all(&mut *self.db).await?;
        Ok(visits)
    }

    #[instrument(skip(self), fields(visit_id = %abbrev_uuid(&id)), err)]
    pub async fn get_with_names(&mut self, id: VisitId) -> Result<Option<VisitWithNames>> {
        let mut query = QueryBuilder::new(VISIT_WITH_NAMES);
        query.push(" AND v.id = ");
        query.push_bind(id);
        let visit = query.build_query_as::<VisitWithNames>().fetch_optional(&mut *self.db).await?;
        Ok(visit)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &VisitFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM visits v WHERE 1=1");
        filter.push_conditions(&mut query);
        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// Move a visit from `from` to `to`, stamping actual_start on in_progress and actual_end on
    /// completed. Returns None when the visit is no longer in `from`.
    #[instrument(skip(self), fields(visit_id = %abbrev_uuid(&id), from = %from, to = %to), err)]
    pub async fn transition(&mut self, id: VisitId, from: VisitStatus, to: VisitStatus) -> Result<Option<VisitDBResponse>> {
        let visit = sqlx::query_as::<_, VisitDBResponse>(
            r#"
            UPDATE visits SET
                status = $3,
                actual_start = CASE WHEN $3 = 'in_progress'::visit_status THEN COALESCE(actual_start, NOW()) ELSE actual_start END,
                actual_end = CASE WHEN $3 = 'completed'::visit_status THEN COALESCE(actual_end, NOW()) ELSE actual_end END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(visit)
    }

    /// Record the clinician's notes and close the visit.
    #[instrument(skip(self, notes), fields(visit_id = %abbrev_uuid(&id)), err)]
    pub async fn document(&mut self, id: VisitId, notes: &str) -> Result<Option<VisitDBResponse>> {
        let visit = sqlx::query_as::<_, VisitDBResponse>(
            r#"
            UPDATE visits SET
                visit_notes = $2,
                status = 'completed',
                actual_end = COALESCE(actual_end, NOW()),
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('cancelled', 'no_show')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(notes)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(visit)
    }

    /// Fails with a unique violation when the visit was already rated.
    #[instrument(skip(self, request), fields(visit_id = %abbrev_uuid(&request.visit_id)), err)]
    pub async fn create_rating(&mut self, request: &VisitRatingCreateDBRequest) -> Result<VisitRatingDBResponse> {
        let rating = sqlx::query_as::<_, VisitRatingDBResponse>(
            r#"
            INSERT INTO visit_ratings (
                visit_id, patient_id, rated_by, overall_rating, care_quality_rating, communication_rating,
                professionalism_rating, timeliness_rating, feedback_text, feedback_categories, would_recommend, is_anonymous
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(request.visit_id)
        .bind(request.patient_id)
        .bind(request.rated_by)
        .bind(request.overall_rating)
        .bind(request.care_quality_rating)
        .bind(request.communication_rating)
        .bind(request.professionalism_rating)
        .bind(request.timeliness_rating)
        .bind(&request.feedback_text)
        .bind(&request.feedback_categories)
        .bind(request.would_recommend)
        .bind(request.is_anonymous)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(rating)
    }

    #[instrument(skip(self), fields(visit_id = %abbrev_uuid(&visit_id)), err)]
    pub async fn rating_for_visit(&mut self, visit_id: VisitId) -> Result<Option<VisitRatingDBResponse>> {
        let rating = sqlx::query_as::<_, VisitRatingDBResponse>("SELECT * FROM visit_ratings WHERE visit_id = $1")
            .bind(visit_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(rating)
    }

    /// Every visit row's type and status, for the analytics page.
    #[instrument(skip(self), err)]
    pub async fn type_and_status_rows(&mut self) -> Result<Vec<VisitDBResponse>> {
        let visits = sqlx::query_as::<_, VisitDBResponse>("SELECT * FROM visits ORDER BY created_at")
            .fetch_all(&mut *self.db)
            .await?;
        Ok(visits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::profiles::Role,
        db::models::visits::VisitType,
        test_utils::{create_test_user, link_clinician, role_record_ids},
    };
    use chrono::Duration;
    use sqlx::PgPool;

    async fn scheduled_visit(pool: &PgPool, start: DateTime<Utc>) -> VisitDBResponse {
        let patient = create_test_user(pool, Role::Patient).await;
        let clinician = create_test_user(pool, Role::Clinician).await;
        let patient_id = link_clinician(pool, &patient, &clinician).await;
        let clinician_id = role_record_ids(pool, clinician.id).await.clinician.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        Visits::new(&mut conn)
            .create(&VisitCreateDBRequest {
                patient_id,
                clinician_id,
                visit_type: VisitType::Nursing,
                scheduled_start: start,
                scheduled_end: start + Duration::hours(1),
                visit_notes: None,
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn transitions_stamp_actual_times(pool: PgPool) {
        let visit = scheduled_visit(&pool, Utc::now() + Duration::hours(2)).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut visits = Visits::new(&mut conn);

        let en_route = visits.transition(visit.id, VisitStatus::Scheduled, VisitStatus::EnRoute).await.unwrap().unwrap();
        assert!(en_route.actual_start.is_none());

        let started = visits.transition(visit.id, VisitStatus::EnRoute, VisitStatus::InProgress).await.unwrap().unwrap();
        assert!(started.actual_start.is_some());
        assert!(started.actual_end.is_none());

        let done = visits.transition(visit.id, VisitStatus::InProgress, VisitStatus::Completed).await.unwrap().unwrap();
        assert_eq!(done.status, VisitStatus::Completed);
        assert!(done.actual_end.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn stale_transition_is_a_no_op(pool: PgPool) {
        let visit = scheduled_visit(&pool, Utc::now()).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut visits = Visits::new(&mut conn);

        assert!(visits.transition(visit.id, VisitStatus::EnRoute, VisitStatus::InProgress).await.unwrap().is_none());
        let unchanged = visits.get_by_id(visit.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, VisitStatus::Scheduled);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn filter_by_window_and_status(pool: PgPool) {
        let now = Utc::now();
        let visit = scheduled_visit(&pool, now + Duration::hours(3)).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut visits = Visits::new(&mut conn);

        let mut filter = VisitFilter::new(0, 10);
        filter.patient_ids = Some(vec![visit.patient_id]);
        filter.from = Some(now);
        filter.statuses = Some(vec![VisitStatus::Scheduled, VisitStatus::EnRoute]);
        assert_eq!(visits.count(&filter).await.unwrap(), 1);

        let listed = visits.list_with_names(&filter).await.unwrap();
        assert_eq!(listed[0].visit.id, visit.id);
        assert_eq!(listed[0].patient_first_name, "Test");

        filter.statuses = Some(vec![VisitStatus::Completed]);
        assert_eq!(visits.count(&filter).await.unwrap(), 0);

        filter.statuses = None;
        filter.patient_ids = Some(vec![]);
        assert!(visits.list(&filter).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn second_rating_is_a_unique_violation(pool: PgPool) {
        let visit = scheduled_visit(&pool, Utc::now()).await;
        let rater = create_test_user(&pool, Role::Caregiver).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut visits = Visits::new(&mut conn);

        let request = VisitRatingCreateDBRequest {
            visit_id: visit.id,
            patient_id: visit.patient_id,
            rated_by: rater.id,
            overall_rating: 5,
            care_quality_rating: Some(5),
            communication_rating: None,
            professionalism_rating: None,
            timeliness_rating: Some(4),
            feedback_text: Some("Very thorough".to_string()),
            feedback_categories: vec!["excellent_care".to_string(), "on_time".to_string()],
            would_recommend: Some(true),
            is_anonymous: false,
        };
        visits.create_rating(&request).await.unwrap();
        let err = visits.create_rating(&request).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(visits.rating_for_visit(visit.id).await.unwrap().unwrap().feedback_categories.len(), 2);
    }
}
