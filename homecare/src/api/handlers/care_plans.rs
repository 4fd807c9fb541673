use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        care_plans::{CarePlanCreate, CarePlanResponse, GoalCreate, GoalResponse, GoalUpdate},
        profiles::CurrentUser,
    },
    auth::permissions::require_patient_access,
    db::{
        handlers::{CarePlans, Notifications, RoleRecords},
        models::{
            care_plans::{CarePlanCreateDBRequest, CarePlanDBResponse, GoalCreateDBRequest, GoalUpdateDBRequest},
            notifications::NotificationCreateDBRequest,
        },
    },
    errors::{Error, Result},
    types::{CarePlanId, GoalId, Operation, PatientId, Resource},
};

async fn load_plan(conn: &mut PgConnection, id: CarePlanId) -> Result<CarePlanDBResponse> {
    CarePlans::new(conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Care plan".to_string(),
        id: id.to_string(),
    })
}

fn validate_goal(goal: &GoalCreate) -> Result<()> {
    if goal.description.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Goal description cannot be empty".to_string(),
        });
    }
    Ok(())
}

async fn notify_patient(conn: &mut PgConnection, plan: &CarePlanDBResponse) -> Result<()> {
    if let Some(patient) = RoleRecords::new(&mut *conn).get_patient(plan.patient_id).await? {
        Notifications::new(&mut *conn)
            .create(&NotificationCreateDBRequest::care_plan_update(patient.patient.profile_id, &plan.title))
            .await?;
    }
    Ok(())
}

/// A patient's care plans with their goals and progress
#[utoipa::path(
    get,
    path = "/patients/{patient_id}/care-plans",
    tag = "care_plans",
    params(("patient_id" = uuid::Uuid, Path, description = "Patient record ID")),
    responses(
        (status = 200, description = "Care plans, newest first", body = [CarePlanResponse]),
        (status = 403, description = "No care relationship with this patient"),
        (status = 404, description = "Patient not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id))]
pub async fn list_care_plans(
    State(state): State<AppState>,
    Path(patient_id): Path<PatientId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<CarePlanResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut conn, &current_user, patient_id, Resource::CarePlans, Operation::ReadOwn).await?;

    let mut repo = CarePlans::new(&mut conn);
    let plans = repo.list_for_patient(patient_id).await?;
    let plan_ids: Vec<CarePlanId> = plans.iter().map(|p| p.id).collect();
    let goals = repo.goals_for_plans(&plan_ids).await?;

    Ok(Json(plans.into_iter().map(|plan| CarePlanResponse::with_goals(plan, &goals)).collect()))
}

/// Create a care plan, optionally with its first goals
#[utoipa::path(
    post,
    path = "/patients/{patient_id}/care-plans",
    tag = "care_plans",
    request_body = CarePlanCreate,
    params(("patient_id" = uuid::Uuid, Path, description = "Patient record ID")),
    responses(
        (status = 201, description = "Care plan created", body = CarePlanResponse),
        (status = 400, description = "Missing title or goal description"),
        (status = 403, description = "Only the patient's clinicians or agency admins"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id))]
pub async fn create_care_plan(
    State(state): State<AppState>,
    Path(patient_id): Path<PatientId>,
    current_user: CurrentUser,
    Json(request): Json<CarePlanCreate>,
) -> Result<(StatusCode, Json<CarePlanResponse>)> {
    if request.title.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Care plan title cannot be empty".to_string(),
        });
    }
    request.goals.iter().try_for_each(validate_goal)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut tx, &current_user, patient_id, Resource::CarePlans, Operation::CreateOwn).await?;

    let mut repo = CarePlans::new(&mut tx);
    let plan = repo
        .create(&CarePlanCreateDBRequest {
            patient_id,
            title: request.title.trim().to_string(),
            description: request.description,
            status: request.status,
            start_date: request.start_date,
            end_date: request.end_date,
            created_by: current_user.id,
        })
        .await?;

    let mut goals = Vec::with_capacity(request.goals.len());
    for goal in request.goals {
        goals.push(
            repo.create_goal(&GoalCreateDBRequest {
                care_plan_id: plan.id,
                description: goal.description.trim().to_string(),
                target_date: goal.target_date,
            })
            .await?,
        );
    }
    notify_patient(&mut tx, &plan).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(CarePlanResponse::with_goals(plan, &goals))))
}

#[utoipa::path(
    post,
    path = "/care-plans/{care_plan_id}/goals",
    tag = "care_plans",
    request_body = GoalCreate,
    params(("care_plan_id" = uuid::Uuid, Path, description = "Care plan ID")),
    responses(
        (status = 201, description = "Goal added", body = GoalResponse),
        (status = 403, description = "Only the patient's clinicians or agency admins"),
        (status = 404, description = "Care plan not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(care_plan_id = %care_plan_id))]
pub async fn add_goal(
    State(state): State<AppState>,
    Path(care_plan_id): Path<CarePlanId>,
    current_user: CurrentUser,
    Json(request): Json<GoalCreate>,
) -> Result<(StatusCode, Json<GoalResponse>)> {
    validate_goal(&request)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plan = load_plan(&mut conn, care_plan_id).await?;
    require_patient_access(&mut conn, &current_user, plan.patient_id, Resource::CarePlans, Operation::UpdateOwn).await?;

    let goal = CarePlans::new(&mut conn)
        .create_goal(&GoalCreateDBRequest {
            care_plan_id,
            description: request.description.trim().to_string(),
            target_date: request.target_date,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(goal.into())))
}

/// Update a goal's status or progress
#[utoipa::path(
    patch,
    path = "/care-plan-goals/{goal_id}",
    tag = "care_plans",
    request_body = GoalUpdate,
    params(("goal_id" = uuid::Uuid, Path, description = "Goal ID")),
    responses(
        (status = 200, description = "Goal updated", body = GoalResponse),
        (status = 400, description = "Progress outside 0 to 100"),
        (status = 403, description = "Only the patient's clinicians or agency admins"),
        (status = 404, description = "Goal not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(goal_id = %goal_id))]
pub async fn update_goal(
    State(state): State<AppState>,
    Path(goal_id): Path<GoalId>,
    current_user: CurrentUser,
    Json(request): Json<GoalUpdate>,
) -> Result<Json<GoalResponse>> {
    request.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let goal = CarePlans::new(&mut conn).get_goal(goal_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Care plan goal".to_string(),
        id: goal_id.to_string(),
    })?;
    let plan = load_plan(&mut conn, goal.care_plan_id).await?;
    require_patient_access(&mut conn, &current_user, plan.patient_id, Resource::CarePlans, Operation::UpdateOwn).await?;

    let updated = CarePlans::new(&mut conn)
        .update_goal(goal_id, &GoalUpdateDBRequest::from(request))
        .await?;
    Ok(Json(updated.into()))
}
