use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::json;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        profiles::{CurrentUser, ListProfilesQuery, ProfileResponse, ProfileUpdate},
    },
    auth::permissions::{RequiresPermission, has_permission, operation, resource},
    db::{
        handlers::{AuditLogs, Profiles, Repository, RoleRecords, profiles::ProfileFilter},
        models::{
            audit_logs::{AuditAction, AuditLogCreateDBRequest},
            profiles::ProfileUpdateDBRequest,
        },
    },
    errors::{Error, Result},
    types::{Operation, Permission, ProfileId, ProfileIdOrCurrent, Resource},
};

/// Resolve `current` or an explicit id, allowing other profiles only to callers with `*All`.
fn target_profile(current_user: &CurrentUser, id: ProfileIdOrCurrent, operation: Operation) -> Result<ProfileId> {
    match id {
        ProfileIdOrCurrent::Current(_) => Ok(current_user.id),
        ProfileIdOrCurrent::Id(id) if id == current_user.id => Ok(id),
        ProfileIdOrCurrent::Id(id) => {
            let all = match operation {
                Operation::UpdateOwn => Operation::UpdateAll,
                _ => Operation::ReadAll,
            };
            if has_permission(current_user, Resource::Profiles, all) {
                Ok(id)
            } else {
                Err(Error::InsufficientPermissions {
                    required: Permission::Allow(Resource::Profiles, all),
                    action: operation,
                    resource: format!("profile {id}"),
                })
            }
        }
    }
}

/// List profiles
#[utoipa::path(
    get,
    path = "/profiles",
    tag = "profiles",
    params(ListProfilesQuery),
    responses(
        (status = 200, description = "Page of profiles", body = PaginatedResponse<ProfileResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Agency admins only"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_profiles(
    State(state): State<AppState>,
    Query(query): Query<ListProfilesQuery>,
    _: RequiresPermission<resource::Profiles, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<ProfileResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();
    let filter = ProfileFilter {
        skip,
        limit,
        search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        role: query.role,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Profiles::new(&mut conn);
    let profiles = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        profiles.into_iter().map(ProfileResponse::from).collect(),
        total,
        skip,
        limit,
    )))
}

/// Get a profile, or `current` for the caller's own
#[utoipa::path(
    get,
    path = "/profiles/{profile_id}",
    tag = "profiles",
    params(("profile_id" = String, Path, description = "Profile ID (UUID) or 'current'")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only agency admins may read other profiles"),
        (status = 404, description = "Profile not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<ProfileIdOrCurrent>,
    current_user: CurrentUser,
) -> Result<Json<ProfileResponse>> {
    let id = target_profile(&current_user, profile_id, Operation::ReadOwn)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let profile = Profiles::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Profile".to_string(),
        id: id.to_string(),
    })?;
    Ok(Json(profile.into()))
}

/// Update a profile
///
/// Anyone may edit their own contact details. Changing `role` is reserved for agency admins,
/// creates the role record the new role needs, and is written to the audit log.
#[utoipa::path(
    patch,
    path = "/profiles/{profile_id}",
    tag = "profiles",
    request_body = ProfileUpdate,
    params(("profile_id" = String, Path, description = "Profile ID (UUID) or 'current'")),
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Not allowed to edit this profile or its role"),
        (status = 404, description = "Profile not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<ProfileIdOrCurrent>,
    current_user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let id = target_profile(&current_user, profile_id, Operation::UpdateOwn)?;

    if update.role.is_some() && !has_permission(&current_user, Resource::Profiles, Operation::UpdateAll) {
        return Err(Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Profiles, Operation::UpdateAll),
            action: Operation::UpdateAll,
            resource: "profile role".to_string(),
        });
    }
    for (field, value) in [("first_name", &update.first_name), ("last_name", &update.last_name)] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(Error::BadRequest {
                message: format!("{field} cannot be empty"),
            });
        }
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let before = Profiles::new(&mut tx).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Profile".to_string(),
        id: id.to_string(),
    })?;

    let request = ProfileUpdateDBRequest::from(update);
    let updated = Profiles::new(&mut tx).update(id, &request).await?;

    if updated.role != before.role {
        RoleRecords::new(&mut tx).ensure_for_profile(updated.id, updated.role).await?;
        AuditLogs::new(&mut tx)
            .record(
                &AuditLogCreateDBRequest::new(current_user.id, AuditAction::ProfileRoleChanged, updated.id)
                    .with_details(json!({ "from": before.role, "to": updated.role })),
            )
            .await?;
        tracing::info!(profile_id = %updated.id, from = %before.role, to = %updated.role, "profile role changed");
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(updated.into()))
}
