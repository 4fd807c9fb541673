use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::alerts::{AlertCreate, AlertQuery, AlertResponse, AlertsResponse},
    auth::permissions::{RequiresPermission, accessible_patient_ids, operation, require_patient_access, resource},
    db::{
        handlers::{Alerts, AuditLogs, RoleRecords},
        models::{
            alerts::{AlertCreateDBRequest, AlertDBResponse, AlertWithPatient},
            audit_logs::{AuditAction, AuditLogCreateDBRequest},
        },
    },
    errors::{Error, Result},
    types::{AlertId, Operation, Resource},
};

async fn with_patient(conn: &mut PgConnection, alert: AlertDBResponse) -> Result<AlertResponse> {
    let (patient_first_name, patient_last_name) = match RoleRecords::new(conn).get_patient(alert.patient_id).await? {
        Some(patient) => (patient.first_name, patient.last_name),
        None => (String::new(), String::new()),
    };
    Ok(AlertWithPatient {
        alert,
        patient_first_name,
        patient_last_name,
    }
    .into())
}

/// Active and resolved alerts for the caller's patients
///
/// Clinicians see alerts for patients they are actively assigned to; agency admins see all.
#[utoipa::path(
    get,
    path = "/alerts",
    tag = "alerts",
    params(AlertQuery),
    responses(
        (status = 200, description = "Alerts with badge counts", body = AlertsResponse),
        (status = 403, description = "Clinicians and agency admins only"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertQuery>,
    permission: RequiresPermission<resource::Alerts, operation::ReadOwn>,
) -> Result<Json<AlertsResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let patient_ids = accessible_patient_ids(&mut conn, &permission.user).await?;

    let mut repo = Alerts::new(&mut conn);
    let active = repo.list_for_patients(patient_ids.as_deref(), true).await?;
    let resolved = repo.list_for_patients(patient_ids.as_deref(), false).await?;

    Ok(Json(AlertsResponse::build(
        active.into_iter().map(AlertResponse::from).collect(),
        resolved.into_iter().map(AlertResponse::from).collect(),
        &query,
        Utc::now().date_naive(),
    )))
}

#[utoipa::path(
    post,
    path = "/alerts",
    tag = "alerts",
    request_body = AlertCreate,
    responses(
        (status = 201, description = "Alert raised", body = AlertResponse),
        (status = 400, description = "Missing type or message"),
        (status = 403, description = "Not one of the patient's clinicians"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %request.patient_id, severity = ?request.severity))]
pub async fn create_alert(
    State(state): State<AppState>,
    permission: RequiresPermission<resource::Alerts, operation::CreateOwn>,
    Json(request): Json<AlertCreate>,
) -> Result<(StatusCode, Json<AlertResponse>)> {
    let alert_type = request.alert_type.trim().to_lowercase();
    let message = request.message.trim().to_string();
    if alert_type.is_empty() || message.is_empty() {
        return Err(Error::BadRequest {
            message: "alert_type and message are required".to_string(),
        });
    }

    let user = permission.user;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut conn, &user, request.patient_id, Resource::Alerts, Operation::CreateOwn).await?;

    let alert = Alerts::new(&mut conn)
        .create(&AlertCreateDBRequest {
            patient_id: request.patient_id,
            alert_type,
            severity: request.severity,
            message,
            created_by: user.id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(with_patient(&mut conn, alert).await?)))
}

/// Mark an alert resolved
#[utoipa::path(
    post,
    path = "/alerts/{alert_id}/resolve",
    tag = "alerts",
    params(("alert_id" = uuid::Uuid, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert resolved", body = AlertResponse),
        (status = 403, description = "Not one of the patient's clinicians"),
        (status = 404, description = "Alert not found"),
        (status = 409, description = "Alert already resolved"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(alert_id = %alert_id))]
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<AlertId>,
    permission: RequiresPermission<resource::Alerts, operation::UpdateOwn>,
) -> Result<Json<AlertResponse>> {
    let user = permission.user;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let alert = Alerts::new(&mut tx).get_by_id(alert_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Alert".to_string(),
        id: alert_id.to_string(),
    })?;
    require_patient_access(&mut tx, &user, alert.patient_id, Resource::Alerts, Operation::UpdateOwn).await?;

    let resolved = Alerts::new(&mut tx)
        .resolve(alert_id, user.id)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: "This alert has already been resolved".to_string(),
        })?;
    AuditLogs::new(&mut tx)
        .record(
            &AuditLogCreateDBRequest::new(user.id, AuditAction::AlertResolved, alert_id)
                .with_details(json!({ "patient_id": resolved.patient_id, "severity": resolved.severity })),
        )
        .await?;
    let response = with_patient(&mut tx, resolved).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(alert_id = %alert_id, "alert resolved");
    Ok(Json(response))
}
