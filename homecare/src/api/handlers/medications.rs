use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};

use crate::{
    AppState,
    aggregation::adherence_rate,
    api::models::{
        medications::{
            AdherenceResponse, ListMedicationsQuery, MedicationCreate, MedicationLogCreate, MedicationLogResponse, MedicationResponse,
            MedicationUpdate,
        },
        profiles::CurrentUser,
    },
    auth::permissions::{PatientAccess, require_patient_access},
    db::{
        handlers::{Medications, Repository, medications::MedicationFilter},
        models::medications::{MedicationCreateDBRequest, MedicationLogCreateDBRequest, MedicationLogStatus, MedicationUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{MedicationId, Operation, PatientId, Permission, Resource},
};

const ADHERENCE_WINDOW_DAYS: i64 = 30;

fn require_medication_management(access: &PatientAccess, operation: Operation) -> Result<()> {
    if access.can_manage_medications() {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Granted,
            action: operation,
            resource: "medications (caregiver link lacks medication management)".to_string(),
        })
    }
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/medications",
    tag = "medications",
    params(("patient_id" = uuid::Uuid, Path, description = "Patient record ID"), ListMedicationsQuery),
    responses(
        (status = 200, description = "Medications, active first", body = [MedicationResponse]),
        (status = 403, description = "No care relationship with this patient"),
        (status = 404, description = "Patient not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id))]
pub async fn list_medications(
    State(state): State<AppState>,
    Path(patient_id): Path<PatientId>,
    Query(query): Query<ListMedicationsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<MedicationResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut conn, &current_user, patient_id, Resource::Medications, Operation::ReadOwn).await?;

    let medications = Medications::new(&mut conn)
        .list(&MedicationFilter {
            patient_id,
            active_only: !query.include_inactive,
        })
        .await?;
    Ok(Json(medications.into_iter().map(MedicationResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/patients/{patient_id}/medications",
    tag = "medications",
    request_body = MedicationCreate,
    params(("patient_id" = uuid::Uuid, Path, description = "Patient record ID")),
    responses(
        (status = 201, description = "Medication added", body = MedicationResponse),
        (status = 400, description = "Missing name, dosage or frequency"),
        (status = 403, description = "Not allowed to manage this patient's medications"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id))]
pub async fn create_medication(
    State(state): State<AppState>,
    Path(patient_id): Path<PatientId>,
    current_user: CurrentUser,
    Json(request): Json<MedicationCreate>,
) -> Result<(StatusCode, Json<MedicationResponse>)> {
    for (field, value) in [("name", &request.name), ("dosage", &request.dosage), ("frequency", &request.frequency)] {
        if value.trim().is_empty() {
            return Err(Error::BadRequest {
                message: format!("{field} is required"),
            });
        }
    }
    if let (Some(start), Some(end)) = (request.start_date, request.end_date)
        && end < start
    {
        return Err(Error::BadRequest {
            message: "end_date cannot be before start_date".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let access = require_patient_access(&mut conn, &current_user, patient_id, Resource::Medications, Operation::CreateOwn).await?;
    require_medication_management(&access, Operation::CreateOwn)?;

    let medication = Medications::new(&mut conn)
        .create(&MedicationCreateDBRequest {
            patient_id,
            name: request.name.trim().to_string(),
            dosage: request.dosage.trim().to_string(),
            frequency: request.frequency.trim().to_string(),
            instructions: request.instructions,
            prescribing_physician: request.prescribing_physician,
            start_date: request.start_date,
            end_date: request.end_date,
            reminder_enabled: request.reminder_enabled,
            reminder_times: request.reminder_times,
            created_by: current_user.id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(medication.into())))
}

/// Edit or discontinue a medication
#[utoipa::path(
    patch,
    path = "/medications/{medication_id}",
    tag = "medications",
    request_body = MedicationUpdate,
    params(("medication_id" = uuid::Uuid, Path, description = "Medication ID")),
    responses(
        (status = 200, description = "Medication updated", body = MedicationResponse),
        (status = 403, description = "Not allowed to manage this patient's medications"),
        (status = 404, description = "Medication not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(medication_id = %medication_id))]
pub async fn update_medication(
    State(state): State<AppState>,
    Path(medication_id): Path<MedicationId>,
    current_user: CurrentUser,
    Json(request): Json<MedicationUpdate>,
) -> Result<Json<MedicationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let medication = Medications::new(&mut conn)
        .get_by_id(medication_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Medication".to_string(),
            id: medication_id.to_string(),
        })?;
    let access = require_patient_access(&mut conn, &current_user, medication.patient_id, Resource::Medications, Operation::UpdateOwn).await?;
    require_medication_management(&access, Operation::UpdateOwn)?;

    let updated = Medications::new(&mut conn)
        .update(medication_id, &MedicationUpdateDBRequest::from(request))
        .await?;
    Ok(Json(updated.into()))
}

/// Record a scheduled dose as taken, missed or pending
#[utoipa::path(
    post,
    path = "/medications/{medication_id}/logs",
    tag = "medications",
    request_body = MedicationLogCreate,
    params(("medication_id" = uuid::Uuid, Path, description = "Medication ID")),
    responses(
        (status = 201, description = "Dose logged", body = MedicationLogResponse),
        (status = 400, description = "Medication discontinued"),
        (status = 403, description = "Not allowed to manage this patient's medications"),
        (status = 404, description = "Medication not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(medication_id = %medication_id))]
pub async fn log_medication(
    State(state): State<AppState>,
    Path(medication_id): Path<MedicationId>,
    current_user: CurrentUser,
    Json(request): Json<MedicationLogCreate>,
) -> Result<(StatusCode, Json<MedicationLogResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let medication = Medications::new(&mut conn)
        .get_by_id(medication_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Medication".to_string(),
            id: medication_id.to_string(),
        })?;
    let access = require_patient_access(&mut conn, &current_user, medication.patient_id, Resource::Medications, Operation::CreateOwn).await?;
    require_medication_management(&access, Operation::CreateOwn)?;

    if !medication.is_active {
        return Err(Error::BadRequest {
            message: format!("{} has been discontinued", medication.name),
        });
    }

    let taken_at = match request.status {
        MedicationLogStatus::Taken => Some(request.taken_at.unwrap_or_else(Utc::now)),
        _ => None,
    };
    let log = Medications::new(&mut conn)
        .create_log(&MedicationLogCreateDBRequest {
            medication_id,
            patient_id: medication.patient_id,
            scheduled_time: request.scheduled_time,
            taken_at,
            status: request.status,
            notes: request.notes,
            logged_by: current_user.id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(log.into())))
}

/// Share of doses taken over the last 30 days
#[utoipa::path(
    get,
    path = "/patients/{patient_id}/adherence",
    tag = "medications",
    params(("patient_id" = uuid::Uuid, Path, description = "Patient record ID")),
    responses(
        (status = 200, description = "Adherence rate and label", body = AdherenceResponse),
        (status = 403, description = "No care relationship with this patient"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id))]
pub async fn get_adherence(
    State(state): State<AppState>,
    Path(patient_id): Path<PatientId>,
    current_user: CurrentUser,
) -> Result<Json<AdherenceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut conn, &current_user, patient_id, Resource::Medications, Operation::ReadOwn).await?;

    let since = Utc::now() - Duration::days(ADHERENCE_WINDOW_DAYS);
    let logs = Medications::new(&mut conn).logs_since(patient_id, since).await?;

    Ok(Json(AdherenceResponse {
        patient_id,
        window_days: ADHERENCE_WINDOW_DAYS,
        adherence: adherence_rate(logs.iter().map(|log| &log.status)),
    }))
}
