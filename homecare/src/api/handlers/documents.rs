use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        documents::{DocumentCreate, DocumentResponse},
        profiles::{CurrentUser, Role},
    },
    auth::permissions::require_patient_access,
    db::{handlers::Documents, models::documents::DocumentCreateDBRequest},
    errors::{Error, Result},
    types::{DocumentId, Operation, PatientId, Permission, Resource},
};

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/documents",
    tag = "documents",
    params(("patient_id" = uuid::Uuid, Path, description = "Patient record ID")),
    responses(
        (status = 200, description = "Documents, newest first", body = [DocumentResponse]),
        (status = 403, description = "No care relationship with this patient"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id))]
pub async fn list_documents(
    State(state): State<AppState>,
    Path(patient_id): Path<PatientId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut conn, &current_user, patient_id, Resource::Documents, Operation::ReadOwn).await?;

    let documents = Documents::new(&mut conn).list_for_patient(patient_id).await?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

/// Record an uploaded document
///
/// The file itself is stored by the client in blob storage; this records its URL and metadata.
#[utoipa::path(
    post,
    path = "/patients/{patient_id}/documents",
    tag = "documents",
    request_body = DocumentCreate,
    params(("patient_id" = uuid::Uuid, Path, description = "Patient record ID")),
    responses(
        (status = 201, description = "Document recorded", body = DocumentResponse),
        (status = 400, description = "Missing fields or file too large"),
        (status = 403, description = "No care relationship with this patient"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(patient_id = %patient_id, file_size = request.file_size))]
pub async fn upload_document(
    State(state): State<AppState>,
    Path(patient_id): Path<PatientId>,
    current_user: CurrentUser,
    Json(request): Json<DocumentCreate>,
) -> Result<(StatusCode, Json<DocumentResponse>)> {
    request.validate(state.config.documents.max_file_size)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    require_patient_access(&mut conn, &current_user, patient_id, Resource::Documents, Operation::CreateOwn).await?;

    let mime_type = request.resolved_mime_type();
    let document = Documents::new(&mut conn)
        .create(&DocumentCreateDBRequest {
            patient_id,
            document_type: request.document_type,
            file_name: request.file_name.trim().to_string(),
            file_url: request.file_url.trim().to_string(),
            file_size: request.file_size,
            mime_type,
            description: request.description,
            uploaded_by: current_user.id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(document.into())))
}

/// Delete a document. Only its uploader or an agency admin may.
#[utoipa::path(
    delete,
    path = "/documents/{document_id}",
    tag = "documents",
    params(("document_id" = uuid::Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 403, description = "Not the uploader"),
        (status = 404, description = "Document not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(document_id = %document_id))]
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<DocumentId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Documents::new(&mut conn);
    let document = repo.get_by_id(document_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Document".to_string(),
        id: document_id.to_string(),
    })?;

    if current_user.role != Role::AgencyAdmin && document.uploaded_by != Some(current_user.id) {
        return Err(Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Documents, Operation::DeleteAll),
            action: Operation::DeleteOwn,
            resource: format!("document {document_id}"),
        });
    }

    repo.delete(document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{documents::DocumentResponse, profiles::Role},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn upload_guesses_mime_type_and_only_uploader_deletes(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let patient_id = link_clinician(&pool, &patient, &clinician).await;

        let (p_name, p_value) = add_auth_header(&patient);
        let response = app
            .post(&format!("/api/v1/patients/{patient_id}/documents"))
            .add_header(&p_name, &p_value)
            .json(&json!({
                "document_type": "insurance_card",
                "file_name": "card.png",
                "file_url": "https://blobs.example.com/card.png",
                "file_size": 2048
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let document: DocumentResponse = response.json();
        assert_eq!(document.mime_type, "image/png");

        let (c_name, c_value) = add_auth_header(&clinician);
        let listed: Vec<DocumentResponse> = app
            .get(&format!("/api/v1/patients/{patient_id}/documents"))
            .add_header(&c_name, &c_value)
            .await
            .json();
        assert_eq!(listed.len(), 1);

        app.delete(&format!("/api/v1/documents/{}", document.id))
            .add_header(&c_name, &c_value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.delete(&format!("/api/v1/documents/{}", document.id))
            .add_header(&p_name, &p_value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn oversized_uploads_and_strangers_are_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let stranger = create_test_user(&pool, Role::Caregiver).await;
        let patient_id = link_clinician(&pool, &patient, &clinician).await;
        let upload = |size: i64| {
            json!({ "file_name": "scan.pdf", "file_url": "https://blobs.example.com/scan.pdf", "file_size": size })
        };

        let (p_name, p_value) = add_auth_header(&patient);
        app.post(&format!("/api/v1/patients/{patient_id}/documents"))
            .add_header(&p_name, &p_value)
            .json(&upload(10 * 1024 * 1024 + 1))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (s_name, s_value) = add_auth_header(&stranger);
        app.post(&format!("/api/v1/patients/{patient_id}/documents"))
            .add_header(&s_name, &s_value)
            .json(&upload(100))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
