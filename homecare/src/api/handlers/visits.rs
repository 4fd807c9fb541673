use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        profiles::{CurrentUser, Role},
        visits::{
            ListVisitsQuery, VisitCreate, VisitDetailResponse, VisitDocumentation, VisitRatingCreate, VisitRatingResponse, VisitResponse,
            VisitStatusUpdate,
        },
    },
    auth::permissions::{RequiresPermission, accessible_patient_ids, operation, require_patient_access, resource},
    db::{
        handlers::{Notifications, Repository, RoleRecords, Visits, visits::VisitFilter},
        models::{
            notifications::NotificationCreateDBRequest,
            visits::{VisitCreateDBRequest, VisitDBResponse, VisitRatingCreateDBRequest, VisitStatus},
        },
    },
    errors::{Error, Result},
    types::{Operation, Resource, VisitId},
};

async fn load_visit(conn: &mut PgConnection, id: VisitId) -> Result<VisitDBResponse> {
    Visits::new(conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Visit".to_string(),
        id: id.to_string(),
    })
}

/// Tell the patient their visit changed.
async fn notify_patient(conn: &mut PgConnection, visit: &VisitDBResponse) -> Result<()> {
    if let Some(patient) = RoleRecords::new(&mut *conn).get_patient(visit.patient_id).await? {
        Notifications::new(&mut *conn)
            .create(&NotificationCreateDBRequest::visit_update(
                patient.patient.profile_id,
                visit.visit_type,
                visit.status,
            ))
            .await?;
    }
    Ok(())
}

/// List visits for the patients the caller may see
#[utoipa::path(
    get,
    path = "/visits",
    tag = "visits",
    params(ListVisitsQuery),
    responses(
        (status = 200, description = "Visits, earliest first", body = PaginatedResponse<VisitDetailResponse>),
        (status = 403, description = "No access to the requested patient"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_visits(
    State(state): State<AppState>,
    Query(query): Query<ListVisitsQuery>,
    permission: RequiresPermission<resource::Visits, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<VisitDetailResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let patient_ids = match query.patient_id {
        Some(patient_id) => {
            require_patient_access(&mut conn, &permission.user, patient_id, Resource::Visits, Operation::ReadOwn).await?;
            Some(vec![patient_id])
        }
        None => accessible_patient_ids(&mut conn, &permission.user).await?,
    };

    let filter = VisitFilter {
        patient_ids,
        statuses: query.status.map(|s| vec![s]),
        from: query.from,
        to: query.to,
        ascending: true,
        ..VisitFilter::new(skip, limit)
    };
    let mut visits = Visits::new(&mut conn);
    let rows = visits.list_with_names(&filter).await?;
    let total = visits.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        rows.into_iter().map(VisitDetailResponse::from).collect(),
        total,
        skip,
        limit,
    )))
}

/// Schedule a visit
///
/// Clinicians schedule their own visits with linked patients; agency admins must name the
/// clinician.
#[utoipa::path(
    post,
    path = "/visits",
    tag = "visits",
    request_body = VisitCreate,
    responses(
        (status = 201, description = "Visit scheduled", body = VisitResponse),
        (status = 400, description = "Invalid times or missing clinician"),
        (status = 403, description = "Not allowed to schedule for this patient"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %request.patient_id))]
pub async fn create_visit(
    State(state): State<AppState>,
    permission: RequiresPermission<resource::Visits, operation::CreateOwn>,
    Json(request): Json<VisitCreate>,
) -> Result<(StatusCode, Json<VisitResponse>)> {
    request.validate()?;
    let user = permission.user;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut conn, &user, request.patient_id, Resource::Visits, Operation::CreateOwn).await?;

    let clinician_id = match user.role {
        Role::Clinician => {
            let own = RoleRecords::new(&mut conn).ensure_clinician(user.id).await?.id;
            if request.clinician_id.is_some_and(|id| id != own) {
                return Err(Error::BadRequest {
                    message: "Clinicians can only schedule their own visits".to_string(),
                });
            }
            own
        }
        _ => request.clinician_id.ok_or_else(|| Error::BadRequest {
            message: "clinician_id is required".to_string(),
        })?,
    };

    let visit = Visits::new(&mut conn)
        .create(&VisitCreateDBRequest {
            patient_id: request.patient_id,
            clinician_id,
            visit_type: request.visit_type,
            scheduled_start: request.scheduled_start,
            scheduled_end: request.scheduled_end,
            visit_notes: request.visit_notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(visit.into())))
}

#[utoipa::path(
    get,
    path = "/visits/{visit_id}",
    tag = "visits",
    params(("visit_id" = uuid::Uuid, Path, description = "Visit ID")),
    responses(
        (status = 200, description = "Visit with patient and clinician names", body = VisitDetailResponse),
        (status = 403, description = "No care relationship with the visit's patient"),
        (status = 404, description = "Visit not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(visit_id = %visit_id))]
pub async fn get_visit(
    State(state): State<AppState>,
    Path(visit_id): Path<VisitId>,
    current_user: CurrentUser,
) -> Result<Json<VisitDetailResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let visit = Visits::new(&mut conn)
        .get_with_names(visit_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Visit".to_string(),
            id: visit_id.to_string(),
        })?;
    require_patient_access(&mut conn, &current_user, visit.visit.patient_id, Resource::Visits, Operation::ReadOwn).await?;

    Ok(Json(visit.into()))
}

/// Move a visit along its workflow
#[utoipa::path(
    patch,
    path = "/visits/{visit_id}/status",
    tag = "visits",
    request_body = VisitStatusUpdate,
    params(("visit_id" = uuid::Uuid, Path, description = "Visit ID")),
    responses(
        (status = 200, description = "Visit updated", body = VisitResponse),
        (status = 400, description = "Transition not allowed from the current status"),
        (status = 404, description = "Visit not found"),
        (status = 409, description = "Visit status changed concurrently"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(visit_id = %visit_id, to = %request.status))]
pub async fn update_visit_status(
    State(state): State<AppState>,
    Path(visit_id): Path<VisitId>,
    permission: RequiresPermission<resource::Visits, operation::UpdateOwn>,
    Json(request): Json<VisitStatusUpdate>,
) -> Result<Json<VisitResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let visit = load_visit(&mut tx, visit_id).await?;
    require_patient_access(&mut tx, &permission.user, visit.patient_id, Resource::Visits, Operation::UpdateOwn).await?;

    if !visit.status.can_transition_to(request.status) {
        return Err(Error::BadRequest {
            message: format!("A {} visit cannot be marked {}", visit.status, request.status),
        });
    }

    let updated = Visits::new(&mut tx)
        .transition(visit_id, visit.status, request.status)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: "The visit was updated by someone else, reload and try again".to_string(),
        })?;
    notify_patient(&mut tx, &updated).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(updated.into()))
}

/// Record visit notes and complete the visit
#[utoipa::path(
    post,
    path = "/visits/{visit_id}/documentation",
    tag = "visits",
    request_body = VisitDocumentation,
    params(("visit_id" = uuid::Uuid, Path, description = "Visit ID")),
    responses(
        (status = 200, description = "Visit documented and completed", body = VisitResponse),
        (status = 400, description = "Visit was cancelled or missed"),
        (status = 404, description = "Visit not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(visit_id = %visit_id))]
pub async fn document_visit(
    State(state): State<AppState>,
    Path(visit_id): Path<VisitId>,
    permission: RequiresPermission<resource::Visits, operation::UpdateOwn>,
    Json(request): Json<VisitDocumentation>,
) -> Result<Json<VisitResponse>> {
    if request.visit_notes.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Visit notes cannot be empty".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let visit = load_visit(&mut tx, visit_id).await?;
    require_patient_access(&mut tx, &permission.user, visit.patient_id, Resource::Visits, Operation::UpdateOwn).await?;

    if !visit.status.can_document() {
        return Err(Error::BadRequest {
            message: format!("A {} visit cannot be documented", visit.status),
        });
    }
    let documented = Visits::new(&mut tx)
        .document(visit_id, request.visit_notes.trim())
        .await?
        .ok_or_else(|| Error::Conflict {
            message: "The visit was cancelled while it was being documented".to_string(),
        })?;
    if visit.status != VisitStatus::Completed {
        notify_patient(&mut tx, &documented).await?;
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(documented.into()))
}

/// Rate a completed visit
#[utoipa::path(
    post,
    path = "/visits/{visit_id}/rating",
    tag = "visits",
    request_body = VisitRatingCreate,
    params(("visit_id" = uuid::Uuid, Path, description = "Visit ID")),
    responses(
        (status = 201, description = "Rating saved", body = VisitRatingResponse),
        (status = 400, description = "Visit not completed or scores out of range"),
        (status = 403, description = "Only the patient or a linked caregiver may rate"),
        (status = 409, description = "Visit already rated"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(visit_id = %visit_id))]
pub async fn rate_visit(
    State(state): State<AppState>,
    Path(visit_id): Path<VisitId>,
    current_user: CurrentUser,
    Json(request): Json<VisitRatingCreate>,
) -> Result<(StatusCode, Json<VisitRatingResponse>)> {
    request.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let visit = load_visit(&mut conn, visit_id).await?;
    require_patient_access(&mut conn, &current_user, visit.patient_id, Resource::VisitRatings, Operation::CreateOwn).await?;

    if visit.status != VisitStatus::Completed {
        return Err(Error::BadRequest {
            message: "Only completed visits can be rated".to_string(),
        });
    }

    let rating = Visits::new(&mut conn)
        .create_rating(&VisitRatingCreateDBRequest {
            visit_id,
            patient_id: visit.patient_id,
            rated_by: current_user.id,
            overall_rating: request.overall_rating,
            care_quality_rating: request.care_quality_rating,
            communication_rating: request.communication_rating,
            professionalism_rating: request.professionalism_rating,
            timeliness_rating: request.timeliness_rating,
            feedback_text: request.feedback_text.filter(|t| !t.trim().is_empty()),
            feedback_categories: request.feedback_categories.iter().map(|c| c.as_str().to_string()).collect(),
            would_recommend: request.would_recommend,
            is_anonymous: request.is_anonymous,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(rating.into())))
}

#[utoipa::path(
    get,
    path = "/visits/{visit_id}/rating",
    tag = "visits",
    params(("visit_id" = uuid::Uuid, Path, description = "Visit ID")),
    responses(
        (status = 200, description = "The visit's rating", body = VisitRatingResponse),
        (status = 404, description = "Visit not found or not rated"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(visit_id = %visit_id))]
pub async fn get_visit_rating(
    State(state): State<AppState>,
    Path(visit_id): Path<VisitId>,
    current_user: CurrentUser,
) -> Result<Json<VisitRatingResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let visit = load_visit(&mut conn, visit_id).await?;
    require_patient_access(&mut conn, &current_user, visit.patient_id, Resource::VisitRatings, Operation::ReadOwn).await?;

    let rating = Visits::new(&mut conn)
        .rating_for_visit(visit_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Visit rating".to_string(),
            id: visit_id.to_string(),
        })?;
    Ok(Json(rating.into()))
}
