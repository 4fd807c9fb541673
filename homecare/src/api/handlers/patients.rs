use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::json;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        patients::{CareTeamResponse, ListPatientsQuery, PatientResponse},
        profiles::{CurrentUser, Role},
    },
    auth::permissions::{RequiresPermission, accessible_patient_ids, operation, require_patient_access, resource},
    db::{
        handlers::{AuditLogs, CareTeam, RoleRecords},
        models::audit_logs::{AuditAction, AuditLogCreateDBRequest},
    },
    errors::{Error, Result},
    types::{CaregiverId, ClinicianId, Operation, PatientId, Resource},
};

/// List the patients the caller may see
///
/// Agency admins see every patient; everyone else sees their own record or the patients they
/// are actively linked to.
#[utoipa::path(
    get,
    path = "/patients",
    tag = "patients",
    params(ListPatientsQuery),
    responses(
        (status = 200, description = "Accessible patients", body = PaginatedResponse<PatientResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Role has no patient access"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<ListPatientsQuery>,
    permission: RequiresPermission<resource::Patients, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<PatientResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let (patients, total) = match accessible_patient_ids(&mut conn, &permission.user).await? {
        None => {
            let mut records = RoleRecords::new(&mut conn);
            (records.list_all_patients(skip, limit).await?, records.count(Role::Patient).await?)
        }
        Some(ids) => {
            let all = RoleRecords::new(&mut conn).list_patients(&ids).await?;
            let total = all.len() as i64;
            (all.into_iter().skip(skip as usize).take(limit as usize).collect(), total)
        }
    };

    Ok(Json(PaginatedResponse::new(
        patients.into_iter().map(PatientResponse::from).collect(),
        total,
        skip,
        limit,
    )))
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}",
    tag = "patients",
    params(("patient_id" = uuid::Uuid, Path, description = "Patient record ID")),
    responses(
        (status = 200, description = "Patient", body = PatientResponse),
        (status = 403, description = "No care relationship with this patient"),
        (status = 404, description = "Patient not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id))]
pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<PatientId>,
    current_user: CurrentUser,
) -> Result<Json<PatientResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut conn, &current_user, patient_id, Resource::Patients, Operation::ReadOwn).await?;

    let patient = RoleRecords::new(&mut conn)
        .get_patient(patient_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Patient".to_string(),
            id: patient_id.to_string(),
        })?;
    Ok(Json(patient.into()))
}

/// Active clinicians and caregivers for a patient
#[utoipa::path(
    get,
    path = "/patients/{patient_id}/care-team",
    tag = "patients",
    params(("patient_id" = uuid::Uuid, Path, description = "Patient record ID")),
    responses(
        (status = 200, description = "Care team", body = CareTeamResponse),
        (status = 403, description = "No care relationship with this patient"),
        (status = 404, description = "Patient not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id))]
pub async fn get_care_team(
    State(state): State<AppState>,
    Path(patient_id): Path<PatientId>,
    current_user: CurrentUser,
) -> Result<Json<CareTeamResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut conn, &current_user, patient_id, Resource::CareTeam, Operation::ReadOwn).await?;

    let mut team = CareTeam::new(&mut conn);
    let clinicians = team.clinicians_for_patient(patient_id).await?;
    let caregivers = team.caregivers_for_patient(patient_id).await?;

    Ok(Json(CareTeamResponse {
        patient_id,
        clinicians: clinicians.into_iter().map(Into::into).collect(),
        caregivers: caregivers.into_iter().map(Into::into).collect(),
    }))
}

/// Remove a clinician from a patient's care team
///
/// The link row is kept with `revoked_at` set.
#[utoipa::path(
    delete,
    path = "/patients/{patient_id}/clinicians/{clinician_id}",
    tag = "patients",
    params(
        ("patient_id" = uuid::Uuid, Path, description = "Patient record ID"),
        ("clinician_id" = uuid::Uuid, Path, description = "Clinician record ID"),
    ),
    responses(
        (status = 204, description = "Clinician removed"),
        (status = 403, description = "Only the patient or an agency admin may remove clinicians"),
        (status = 404, description = "No active link"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id, clinician_id = %clinician_id))]
pub async fn revoke_clinician(
    State(state): State<AppState>,
    Path((patient_id, clinician_id)): Path<(PatientId, ClinicianId)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut tx, &current_user, patient_id, Resource::CareTeam, Operation::DeleteOwn).await?;

    if !CareTeam::new(&mut tx).revoke_clinician(patient_id, clinician_id).await? {
        return Err(Error::NotFound {
            resource: "Care team clinician".to_string(),
            id: clinician_id.to_string(),
        });
    }
    AuditLogs::new(&mut tx)
        .record(
            &AuditLogCreateDBRequest::new(current_user.id, AuditAction::ClinicianRevoked, clinician_id)
                .with_details(json!({ "patient_id": patient_id })),
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Remove a caregiver from a patient's care team
#[utoipa::path(
    delete,
    path = "/patients/{patient_id}/caregivers/{caregiver_id}",
    tag = "patients",
    params(
        ("patient_id" = uuid::Uuid, Path, description = "Patient record ID"),
        ("caregiver_id" = uuid::Uuid, Path, description = "Caregiver record ID"),
    ),
    responses(
        (status = 204, description = "Caregiver removed"),
        (status = 403, description = "Only the patient or an agency admin may remove caregivers"),
        (status = 404, description = "No active link"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id, caregiver_id = %caregiver_id))]
pub async fn revoke_caregiver(
    State(state): State<AppState>,
    Path((patient_id, caregiver_id)): Path<(PatientId, CaregiverId)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut tx, &current_user, patient_id, Resource::CareTeam, Operation::DeleteOwn).await?;

    if !CareTeam::new(&mut tx).revoke_caregiver(patient_id, caregiver_id).await? {
        return Err(Error::NotFound {
            resource: "Care team caregiver".to_string(),
            id: caregiver_id.to_string(),
        });
    }
    AuditLogs::new(&mut tx)
        .record(
            &AuditLogCreateDBRequest::new(current_user.id, AuditAction::CaregiverRevoked, caregiver_id)
                .with_details(json!({ "patient_id": patient_id })),
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            pagination::PaginatedResponse,
            patients::{CareTeamResponse, PatientResponse},
            profiles::Role,
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn clinicians_see_only_linked_patients(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let linked = create_test_user(&pool, Role::Patient).await;
        let stranger = create_test_user(&pool, Role::Patient).await;
        let linked_id = link_clinician(&pool, &linked, &clinician).await;
        let stranger_id = role_record_ids(&pool, stranger.id).await.patient.unwrap();
        let (name, value) = add_auth_header(&clinician);

        let response = app.get("/api/v1/patients").add_header(&name, &value).await;
        response.assert_status_ok();
        let page: PaginatedResponse<PatientResponse> = response.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, linked_id);

        app.get(&format!("/api/v1/patients/{linked_id}"))
            .add_header(&name, &value)
            .await
            .assert_status_ok();
        app.get(&format!("/api/v1/patients/{stranger_id}"))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.get(&format!("/api/v1/patients/{}", uuid::Uuid::new_v4()))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn vendors_have_no_patient_list(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let vendor = create_test_user(&pool, Role::Vendor).await;
        let (name, value) = add_auth_header(&vendor);
        app.get("/api/v1/patients")
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn patient_revokes_caregiver_and_team_shrinks(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let caregiver = create_test_user(&pool, Role::Caregiver).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let patient_id = link_caregiver(&pool, &patient, &caregiver).await;
        link_clinician(&pool, &patient, &clinician).await;
        let caregiver_id = role_record_ids(&pool, caregiver.id).await.caregiver.unwrap();

        let (name, value) = add_auth_header(&patient);
        let team: CareTeamResponse = app
            .get(&format!("/api/v1/patients/{patient_id}/care-team"))
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(team.caregivers.len(), 1);
        assert_eq!(team.clinicians.len(), 1);

        // clinicians may read the team but not prune it
        let (c_name, c_value) = add_auth_header(&clinician);
        app.delete(&format!("/api/v1/patients/{patient_id}/caregivers/{caregiver_id}"))
            .add_header(&c_name, &c_value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.delete(&format!("/api/v1/patients/{patient_id}/caregivers/{caregiver_id}"))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&format!("/api/v1/patients/{patient_id}/caregivers/{caregiver_id}"))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let team: CareTeamResponse = app
            .get(&format!("/api/v1/patients/{patient_id}/care-team"))
            .add_header(&name, &value)
            .await
            .json();
        assert!(team.caregivers.is_empty());

        let logged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE action = 'care_team.caregiver_revoked'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(logged, 1);
    }
}
