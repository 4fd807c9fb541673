//! Care-team invitations (patient <-> clinician) and caregiver invitations.
//!
//! Answers are conditional updates: a response after expiry gets 400, one on an invitation that is
//! no longer pending gets 409.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        invitations::{
            CaregiverInvitationCreate, CaregiverInvitationListResponse, CaregiverInvitationResponse, InvitationCreate,
            InvitationListResponse, InvitationResponse,
        },
        profiles::{CurrentUser, Role, normalize_email},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{AuditLogs, CareTeam, CaregiverInvitations, Invitations, Notifications, Profiles, RoleRecords, invitations::expires_at},
        models::{
            audit_logs::{AuditAction, AuditLogCreateDBRequest},
            care_team::{AccessLevel, CaregiverLinkCreateDBRequest, ClinicianLinkCreateDBRequest, ClinicianRelationship},
            invitations::{
                CaregiverInvitationCreateDBRequest, InvitationCreateDBRequest, InvitationDBResponse, InvitationStatus, InvitationType,
            },
            notifications::NotificationCreateDBRequest,
        },
    },
    email::{CaregiverInvitationEmail, EmailService},
    errors::{Error, Result},
    types::InvitationId,
};

fn invitation_not_found(id: InvitationId) -> Error {
    Error::NotFound {
        resource: "Invitation".to_string(),
        id: id.to_string(),
    }
}

/// Why a stored invitation can no longer be answered with `answer`, if it can't.
fn ensure_answerable(status: InvitationStatus, effective: InvitationStatus, answer: InvitationStatus) -> Result<()> {
    if effective == InvitationStatus::Expired {
        return Err(Error::BadRequest {
            message: "This invitation has expired".to_string(),
        });
    }
    if !status.can_transition_to(answer) {
        return Err(Error::Conflict {
            message: format!("This invitation has already been {status}"),
        });
    }
    Ok(())
}

fn trimmed(message: Option<String>) -> Option<String> {
    message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty())
}

async fn reload(conn: &mut PgConnection, id: InvitationId) -> Result<InvitationResponse> {
    let row = Invitations::new(conn).get_with_profiles(id).await?.ok_or_else(|| invitation_not_found(id))?;
    Ok(InvitationResponse::from_row(row, Utc::now()))
}

/// Create the patient_clinicians link an accepted invitation stands for, unless it already exists.
async fn link_from_invitation(conn: &mut PgConnection, invitation: &InvitationDBResponse, invitee: &CurrentUser) -> Result<()> {
    let (patient_id, clinician_id) = match invitation.invitation_type {
        InvitationType::PatientToClinician => {
            let clinician = RoleRecords::new(&mut *conn).ensure_clinician(invitee.id).await?;
            (invitation.patient_id, Some(clinician.id))
        }
        InvitationType::ClinicianToPatient => {
            let patient = RoleRecords::new(&mut *conn).ensure_patient(invitee.id).await?;
            (Some(patient.id), invitation.clinician_id)
        }
    };
    let (Some(patient_id), Some(clinician_id)) = (patient_id, clinician_id) else {
        return Err(Error::Internal {
            operation: format!("link care team for invitation {}: inviter record missing", invitation.id),
        });
    };

    let mut care_team = CareTeam::new(conn);
    if care_team.active_clinician_link(patient_id, clinician_id).await?.is_none() {
        care_team
            .assign_clinician(&ClinicianLinkCreateDBRequest {
                patient_id,
                clinician_id,
                relationship_type: ClinicianRelationship::Assigned,
                access_level: AccessLevel::Standard,
                assigned_by: Some(invitation.inviter_id),
            })
            .await?;
    }
    Ok(())
}

async fn respond_to_invitation(
    state: &AppState,
    id: InvitationId,
    current_user: &CurrentUser,
    answer: InvitationStatus,
) -> Result<Json<InvitationResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let invitation = Invitations::new(&mut tx)
        .get_by_id(id)
        .await?
        .filter(|i| i.is_addressed_to(current_user.id, &current_user.email))
        .ok_or_else(|| invitation_not_found(id))?;
    ensure_answerable(invitation.status, invitation.effective_status(Utc::now()), answer)?;
    let expected_role = invitation.invitation_type.invitee_role();
    if answer == InvitationStatus::Accepted && current_user.role != expected_role {
        return Err(Error::BadRequest {
            message: format!("This invitation can only be accepted by a {expected_role} account"),
        });
    }

    let invitation = Invitations::new(&mut tx)
        .respond(id, current_user.id, answer)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: "This invitation is no longer pending".to_string(),
        })?;

    let action = if answer == InvitationStatus::Accepted {
        link_from_invitation(&mut tx, &invitation, current_user).await?;
        AuditAction::InvitationAccepted
    } else {
        AuditAction::InvitationDeclined
    };
    AuditLogs::new(&mut tx)
        .record(
            &AuditLogCreateDBRequest::new(current_user.id, action, invitation.id)
                .with_details(json!({ "invitation_type": invitation.invitation_type, "inviter_id": invitation.inviter_id })),
        )
        .await?;

    let response = reload(&mut tx, id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    tracing::info!(invitation_id = %id, status = %answer, "invitation answered");
    Ok(Json(response))
}

/// Invitations the caller received and sent, newest first
#[utoipa::path(
    get,
    path = "/invitations",
    tag = "invitations",
    responses(
        (status = 200, description = "Received and sent invitations", body = InvitationListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_invitations(
    State(state): State<AppState>,
    permission: RequiresPermission<resource::Invitations, operation::ReadOwn>,
) -> Result<Json<InvitationListResponse>> {
    let user = permission.user;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Invitations::new(&mut conn);
    let now = Utc::now();

    let received = repo.received(user.id, &user.email).await?;
    let sent = repo.sent(user.id).await?;
    Ok(Json(InvitationListResponse {
        received: received.into_iter().map(|row| InvitationResponse::from_row(row, now)).collect(),
        sent: sent.into_iter().map(|row| InvitationResponse::from_row(row, now)).collect(),
    }))
}

/// Invite a clinician (as a patient) or a patient (as a clinician) to form a care relationship
#[utoipa::path(
    post,
    path = "/invitations",
    tag = "invitations",
    request_body = InvitationCreate,
    responses(
        (status = 201, description = "Invitation sent", body = InvitationResponse),
        (status = 400, description = "Invalid email, or the address belongs to the wrong kind of account"),
        (status = 403, description = "Only patients and clinicians send invitations"),
        (status = 409, description = "A pending invitation to this email already exists"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_invitation(
    State(state): State<AppState>,
    permission: RequiresPermission<resource::Invitations, operation::CreateOwn>,
    Json(request): Json<InvitationCreate>,
) -> Result<(StatusCode, Json<InvitationResponse>)> {
    let user = permission.user;
    let invitation_type = InvitationType::sent_by(user.role).ok_or_else(|| Error::BadRequest {
        message: "Only patients and clinicians can send care team invitations".to_string(),
    })?;
    let email = normalize_email(&request.email)?;
    if email == user.email.to_lowercase() {
        return Err(Error::BadRequest {
            message: "You cannot invite yourself".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (patient_id, clinician_id) = match invitation_type {
        InvitationType::PatientToClinician => (Some(RoleRecords::new(&mut tx).ensure_patient(user.id).await?.id), None),
        InvitationType::ClinicianToPatient => (None, Some(RoleRecords::new(&mut tx).ensure_clinician(user.id).await?.id)),
    };

    let invitee = Profiles::new(&mut tx).get_by_email(&email).await?;
    let expected = invitation_type.invitee_role();
    if let Some(invitee) = &invitee
        && invitee.role != expected
    {
        return Err(Error::BadRequest {
            message: format!("{email} belongs to a {} account, not a {expected}", invitee.role),
        });
    }

    let mut repo = Invitations::new(&mut tx);
    if repo.pending_duplicate(user.id, &email).await?.is_some() {
        return Err(Error::Conflict {
            message: format!("You already have a pending invitation to {email}"),
        });
    }
    let invitation = repo
        .create(&InvitationCreateDBRequest {
            inviter_id: user.id,
            invitee_email: email,
            invitee_id: invitee.as_ref().map(|p| p.id),
            invitation_type,
            patient_id,
            clinician_id,
            message: trimmed(request.message),
            expires_at: expires_at(Utc::now(), state.config.invitations.expiry),
        })
        .await?;

    if let Some(invitee) = &invitee {
        Notifications::new(&mut tx)
            .create(&NotificationCreateDBRequest::new_invitation(invitee.id, user.role))
            .await?;
    }
    let response = reload(&mut tx, invitation.id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/invitations/{invitation_id}/accept",
    tag = "invitations",
    params(("invitation_id" = uuid::Uuid, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Accepted; the care relationship now exists", body = InvitationResponse),
        (status = 400, description = "Invitation expired, or the caller holds the wrong role for it"),
        (status = 404, description = "No such invitation addressed to the caller"),
        (status = 409, description = "Invitation already answered or cancelled"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Path(invitation_id): Path<InvitationId>,
    permission: RequiresPermission<resource::Invitations, operation::UpdateOwn>,
) -> Result<Json<InvitationResponse>> {
    respond_to_invitation(&state, invitation_id, &permission.user, InvitationStatus::Accepted).await
}

#[utoipa::path(
    post,
    path = "/invitations/{invitation_id}/decline",
    tag = "invitations",
    params(("invitation_id" = uuid::Uuid, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Declined", body = InvitationResponse),
        (status = 400, description = "Invitation expired"),
        (status = 404, description = "No such invitation addressed to the caller"),
        (status = 409, description = "Invitation already answered or cancelled"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
pub async fn decline_invitation(
    State(state): State<AppState>,
    Path(invitation_id): Path<InvitationId>,
    permission: RequiresPermission<resource::Invitations, operation::UpdateOwn>,
) -> Result<Json<InvitationResponse>> {
    respond_to_invitation(&state, invitation_id, &permission.user, InvitationStatus::Declined).await
}

#[utoipa::path(
    post,
    path = "/invitations/{invitation_id}/cancel",
    tag = "invitations",
    params(("invitation_id" = uuid::Uuid, Path, description = "Invitation ID")),
    responses(
        (status = 200, description = "Cancelled", body = InvitationResponse),
        (status = 404, description = "No such invitation sent by the caller"),
        (status = 409, description = "Invitation is no longer pending"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
pub async fn cancel_invitation(
    State(state): State<AppState>,
    Path(invitation_id): Path<InvitationId>,
    permission: RequiresPermission<resource::Invitations, operation::DeleteOwn>,
) -> Result<Json<InvitationResponse>> {
    let user = permission.user;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Invitations::new(&mut tx);

    if repo.cancel(invitation_id, user.id).await?.is_none() {
        return match repo.get_by_id(invitation_id).await? {
            Some(existing) if existing.inviter_id == user.id => Err(Error::Conflict {
                message: format!("This invitation has already been {}", existing.status),
            }),
            _ => Err(invitation_not_found(invitation_id)),
        };
    }
    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest::new(user.id, AuditAction::InvitationCancelled, invitation_id))
        .await?;

    let response = reload(&mut tx, invitation_id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(response))
}

fn caregiver_invitation_not_found(id: InvitationId) -> Error {
    Error::NotFound {
        resource: "Caregiver invitation".to_string(),
        id: id.to_string(),
    }
}

/// Caregiver invitations addressed to the caller's email, and those the caller sent as a patient
#[utoipa::path(
    get,
    path = "/caregiver-invitations",
    tag = "invitations",
    responses(
        (status = 200, description = "Received and sent caregiver invitations", body = CaregiverInvitationListResponse),
        (status = 403, description = "Patients and caregivers only"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_caregiver_invitations(
    State(state): State<AppState>,
    permission: RequiresPermission<resource::CaregiverInvitations, operation::ReadOwn>,
) -> Result<Json<CaregiverInvitationListResponse>> {
    let user = permission.user;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let now = Utc::now();

    let patient = RoleRecords::new(&mut conn).patient_by_profile(user.id).await?;
    let mut repo = CaregiverInvitations::new(&mut conn);
    let received = repo.list_for_email(&user.email).await?;
    let sent = match patient {
        Some(patient) => repo.list_for_patient(patient.id).await?,
        None => Vec::new(),
    };

    Ok(Json(CaregiverInvitationListResponse {
        received: received.into_iter().map(|row| CaregiverInvitationResponse::from_row(row, now)).collect(),
        sent: sent.into_iter().map(|db| CaregiverInvitationResponse::from_db(db, now)).collect(),
    }))
}

/// Invite a family member or friend to help with your care
///
/// The invitee receives an email with a link to sign up or sign in and accept.
#[utoipa::path(
    post,
    path = "/caregiver-invitations",
    tag = "invitations",
    request_body = CaregiverInvitationCreate,
    responses(
        (status = 201, description = "Invitation sent", body = CaregiverInvitationResponse),
        (status = 400, description = "Invalid email or relationship"),
        (status = 403, description = "Patients only"),
        (status = 409, description = "A pending invitation to this email already exists"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_caregiver_invitation(
    State(state): State<AppState>,
    permission: RequiresPermission<resource::CaregiverInvitations, operation::CreateOwn>,
    Json(request): Json<CaregiverInvitationCreate>,
) -> Result<(StatusCode, Json<CaregiverInvitationResponse>)> {
    let user = permission.user;
    if user.role != Role::Patient {
        return Err(Error::BadRequest {
            message: "Only patients can invite caregivers".to_string(),
        });
    }
    let email = normalize_email(&request.email)?;
    let relationship_type = request.relationship_type.trim().to_lowercase();
    if relationship_type.is_empty() {
        return Err(Error::BadRequest {
            message: "relationship_type is required".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let patient = RoleRecords::new(&mut tx).ensure_patient(user.id).await?;

    let invitee = Profiles::new(&mut tx).get_by_email(&email).await?;
    if let Some(invitee) = &invitee
        && invitee.role != Role::Caregiver
    {
        return Err(Error::BadRequest {
            message: format!("{email} belongs to a {} account, not a caregiver", invitee.role),
        });
    }

    let mut repo = CaregiverInvitations::new(&mut tx);
    if repo.pending_duplicate(patient.id, &email).await?.is_some() {
        return Err(Error::Conflict {
            message: format!("You already have a pending invitation to {email}"),
        });
    }
    let invitation = repo
        .create(&CaregiverInvitationCreateDBRequest {
            patient_id: patient.id,
            email,
            relationship_type,
            is_mpoa: request.is_mpoa,
            access_level: request.access_level,
            permissions: request.permissions,
            message: trimmed(request.message),
            invited_by: user.id,
            expires_at: expires_at(Utc::now(), state.config.invitations.expiry),
        })
        .await?;

    if let Some(invitee) = &invitee {
        Notifications::new(&mut tx)
            .create(&NotificationCreateDBRequest::new_invitation(invitee.id, Role::Patient))
            .await?;
    }
    EmailService::new(&state.config)?
        .send_caregiver_invitation(&CaregiverInvitationEmail {
            invitation_id: invitation.id,
            to_email: &invitation.email,
            patient_name: &user.full_name(),
            relationship_type: &invitation.relationship_type,
            is_mpoa: invitation.is_mpoa,
            message: invitation.message.as_deref(),
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(CaregiverInvitationResponse::from_db(invitation, Utc::now()))))
}

async fn respond_to_caregiver_invitation(
    state: &AppState,
    id: InvitationId,
    current_user: &CurrentUser,
    answer: InvitationStatus,
) -> Result<Json<CaregiverInvitationResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let invitation = CaregiverInvitations::new(&mut tx)
        .get_by_id(id)
        .await?
        .filter(|i| i.email.eq_ignore_ascii_case(&current_user.email))
        .ok_or_else(|| caregiver_invitation_not_found(id))?;
    ensure_answerable(invitation.status, invitation.effective_status(Utc::now()), answer)?;
    if answer == InvitationStatus::Accepted && current_user.role != Role::Caregiver {
        return Err(Error::BadRequest {
            message: "Only caregiver accounts can accept caregiver invitations".to_string(),
        });
    }

    let invitation = CaregiverInvitations::new(&mut tx)
        .respond(id, answer)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: "This invitation is no longer pending".to_string(),
        })?;

    let action = if answer == InvitationStatus::Accepted {
        let caregiver = RoleRecords::new(&mut tx).ensure_caregiver(current_user.id).await?;
        let mut care_team = CareTeam::new(&mut tx);
        if care_team.active_caregiver_link(invitation.patient_id, caregiver.id).await?.is_none() {
            care_team
                .link_caregiver(&CaregiverLinkCreateDBRequest {
                    patient_id: invitation.patient_id,
                    caregiver_id: caregiver.id,
                    relationship_type: invitation.relationship_type.clone(),
                    is_mpoa: invitation.is_mpoa,
                    access_level: invitation.access_level,
                    permissions: invitation.permissions(),
                })
                .await?;
        }
        AuditAction::CaregiverInvitationAccepted
    } else {
        AuditAction::CaregiverInvitationDeclined
    };
    AuditLogs::new(&mut tx)
        .record(
            &AuditLogCreateDBRequest::new(current_user.id, action, invitation.id)
                .with_details(json!({ "patient_id": invitation.patient_id })),
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(invitation_id = %id, status = %answer, "caregiver invitation answered");
    Ok(Json(CaregiverInvitationResponse::from_db(invitation, Utc::now())))
}

#[utoipa::path(
    post,
    path = "/caregiver-invitations/{invitation_id}/accept",
    tag = "invitations",
    params(("invitation_id" = uuid::Uuid, Path, description = "Caregiver invitation ID")),
    responses(
        (status = 200, description = "Accepted; the caregiver is linked to the patient", body = CaregiverInvitationResponse),
        (status = 400, description = "Invitation expired, or the caller is not a caregiver"),
        (status = 404, description = "No such invitation for the caller's email"),
        (status = 409, description = "Invitation already answered or cancelled"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
pub async fn accept_caregiver_invitation(
    State(state): State<AppState>,
    Path(invitation_id): Path<InvitationId>,
    permission: RequiresPermission<resource::CaregiverInvitations, operation::UpdateOwn>,
) -> Result<Json<CaregiverInvitationResponse>> {
    respond_to_caregiver_invitation(&state, invitation_id, &permission.user, InvitationStatus::Accepted).await
}

#[utoipa::path(
    post,
    path = "/caregiver-invitations/{invitation_id}/decline",
    tag = "invitations",
    params(("invitation_id" = uuid::Uuid, Path, description = "Caregiver invitation ID")),
    responses(
        (status = 200, description = "Declined", body = CaregiverInvitationResponse),
        (status = 400, description = "Invitation expired"),
        (status = 404, description = "No such invitation for the caller's email"),
        (status = 409, description = "Invitation already answered or cancelled"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
pub async fn decline_caregiver_invitation(
    State(state): State<AppState>,
    Path(invitation_id): Path<InvitationId>,
    permission: RequiresPermission<resource::CaregiverInvitations, operation::UpdateOwn>,
) -> Result<Json<CaregiverInvitationResponse>> {
    respond_to_caregiver_invitation(&state, invitation_id, &permission.user, InvitationStatus::Declined).await
}

#[utoipa::path(
    post,
    path = "/caregiver-invitations/{invitation_id}/cancel",
    tag = "invitations",
    params(("invitation_id" = uuid::Uuid, Path, description = "Caregiver invitation ID")),
    responses(
        (status = 200, description = "Cancelled", body = CaregiverInvitationResponse),
        (status = 404, description = "No such invitation sent by the caller"),
        (status = 409, description = "Invitation is no longer pending"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(invitation_id = %invitation_id))]
pub async fn cancel_caregiver_invitation(
    State(state): State<AppState>,
    Path(invitation_id): Path<InvitationId>,
    permission: RequiresPermission<resource::CaregiverInvitations, operation::DeleteOwn>,
) -> Result<Json<CaregiverInvitationResponse>> {
    let user = permission.user;
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let patient = RoleRecords::new(&mut tx)
        .patient_by_profile(user.id)
        .await?
        .ok_or_else(|| caregiver_invitation_not_found(invitation_id))?;

    let mut repo = CaregiverInvitations::new(&mut tx);
    let Some(invitation) = repo.cancel(invitation_id, patient.id).await? else {
        return match repo.get_by_id(invitation_id).await? {
            Some(existing) if existing.patient_id == patient.id => Err(Error::Conflict {
                message: format!("This invitation has already been {}", existing.status),
            }),
            _ => Err(caregiver_invitation_not_found(invitation_id)),
        };
    };
    AuditLogs::new(&mut tx)
        .record(
            &AuditLogCreateDBRequest::new(user.id, AuditAction::CaregiverInvitationCancelled, invitation.id)
                .with_details(json!({ "patient_id": invitation.patient_id })),
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(CaregiverInvitationResponse::from_db(invitation, Utc::now())))
}

#[cfg(test)]
mod tests {
    use super::ensure_answerable;
    use crate::{
        api::models::{
            invitations::{CaregiverInvitationListResponse, CaregiverInvitationResponse, InvitationListResponse, InvitationResponse},
            patients::CareTeamResponse,
            profiles::Role,
        },
        db::models::invitations::InvitationStatus,
        errors::Error,
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[test]
    fn expired_beats_already_answered() {
        let accepted = InvitationStatus::Accepted;
        assert!(matches!(
            ensure_answerable(InvitationStatus::Pending, InvitationStatus::Expired, accepted),
            Err(Error::BadRequest { .. })
        ));
        assert!(matches!(
            ensure_answerable(InvitationStatus::Declined, InvitationStatus::Declined, accepted),
            Err(Error::Conflict { .. })
        ));
        assert!(ensure_answerable(InvitationStatus::Pending, InvitationStatus::Pending, accepted).is_ok());
        assert!(matches!(
            ensure_answerable(InvitationStatus::Pending, InvitationStatus::Pending, InvitationStatus::Pending),
            Err(Error::Conflict { .. })
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn accepting_requires_the_invited_role(pool: PgPool) {
        use crate::db::{
            handlers::{Profiles, Repository},
            models::profiles::ProfileCreateDBRequest,
        };

        let app = create_test_app(pool.clone()).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let (p_name, p_value) = add_auth_header(&patient);

        let invitation: InvitationResponse = app
            .post("/api/v1/invitations")
            .add_header(&p_name, &p_value)
            .json(&json!({ "email": "later@example.com" }))
            .await
            .json();
        assert_eq!(invitation.invitee_id, None);

        let mut conn = pool.acquire().await.unwrap();
        let caregiver = Profiles::new(&mut conn)
            .create(&ProfileCreateDBRequest {
                email: "later@example.com".to_string(),
                first_name: "Late".to_string(),
                last_name: "Comer".to_string(),
                phone: None,
                role: Role::Caregiver,
                password_hash: None,
                auth_source: "test".to_string(),
            })
            .await
            .unwrap();
        drop(conn);

        let (name, value) = add_auth_header(&caregiver);
        app.post(&format!("/api/v1/invitations/{}/accept", invitation.id))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let clinician_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clinicians WHERE profile_id = $1")
            .bind(caregiver.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(clinician_rows, 0);
        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patient_clinicians WHERE revoked_at IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(links, 0);

        let status: String = sqlx::query_scalar("SELECT status::text FROM invitations WHERE id = $1")
            .bind(invitation.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, "pending");

        app.post(&format!("/api/v1/invitations/{}/decline", invitation.id))
            .add_header(&name, &value)
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn patient_invites_clinician_who_accepts(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let (p_name, p_value) = add_auth_header(&patient);
        let (c_name, c_value) = add_auth_header(&clinician);

        let response = app
            .post("/api/v1/invitations")
            .add_header(&p_name, &p_value)
            .json(&json!({ "email": clinician.email.to_uppercase(), "message": "Please join my care team" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let invitation: InvitationResponse = response.json();
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert_eq!(invitation.invitee_id, Some(clinician.id));

        app.post("/api/v1/invitations")
            .add_header(&p_name, &p_value)
            .json(&json!({ "email": clinician.email }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let listed: InvitationListResponse = app.get("/api/v1/invitations").add_header(&c_name, &c_value).await.json();
        assert_eq!(listed.received.len(), 1);
        assert!(listed.sent.is_empty());

        let accepted: InvitationResponse = app
            .post(&format!("/api/v1/invitations/{}/accept", invitation.id))
            .add_header(&c_name, &c_value)
            .await
            .json();
        assert_eq!(accepted.status, InvitationStatus::Accepted);
        assert!(accepted.responded_at.is_some());

        app.post(&format!("/api/v1/invitations/{}/decline", invitation.id))
            .add_header(&c_name, &c_value)
            .await
            .assert_status(StatusCode::CONFLICT);

        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();
        let team: CareTeamResponse = app
            .get(&format!("/api/v1/patients/{patient_id}/care-team"))
            .add_header(&p_name, &p_value)
            .await
            .json();
        assert_eq!(team.clinicians.len(), 1);

        let audited: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE action = 'invitation.accepted'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(audited, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn wrong_role_and_expired_invitations_are_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let other_patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let (p_name, p_value) = add_auth_header(&patient);

        app.post("/api/v1/invitations")
            .add_header(&p_name, &p_value)
            .json(&json!({ "email": other_patient.email }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let invitation: InvitationResponse = app
            .post("/api/v1/invitations")
            .add_header(&p_name, &p_value)
            .json(&json!({ "email": clinician.email }))
            .await
            .json();
        sqlx::query("UPDATE invitations SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
            .bind(invitation.id)
            .execute(&pool)
            .await
            .unwrap();

        let (c_name, c_value) = add_auth_header(&clinician);
        app.post(&format!("/api/v1/invitations/{}/accept", invitation.id))
            .add_header(&c_name, &c_value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let listed: InvitationListResponse = app.get("/api/v1/invitations").add_header(&p_name, &p_value).await.json();
        assert_eq!(listed.sent[0].status, InvitationStatus::Expired);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn only_the_inviter_cancels(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let (c_name, c_value) = add_auth_header(&clinician);
        let (p_name, p_value) = add_auth_header(&patient);

        let invitation: InvitationResponse = app
            .post("/api/v1/invitations")
            .add_header(&c_name, &c_value)
            .json(&json!({ "email": patient.email }))
            .await
            .json();

        app.post(&format!("/api/v1/invitations/{}/cancel", invitation.id))
            .add_header(&p_name, &p_value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let cancelled: InvitationResponse = app
            .post(&format!("/api/v1/invitations/{}/cancel", invitation.id))
            .add_header(&c_name, &c_value)
            .await
            .json();
        assert_eq!(cancelled.status, InvitationStatus::Cancelled);
        app.post(&format!("/api/v1/invitations/{}/accept", invitation.id))
            .add_header(&p_name, &p_value)
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn caregiver_invitation_links_on_accept(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let caregiver = create_test_user(&pool, Role::Caregiver).await;
        let (p_name, p_value) = add_auth_header(&patient);

        let response = app
            .post("/api/v1/caregiver-invitations")
            .add_header(&p_name, &p_value)
            .json(&json!({
                "email": caregiver.email,
                "relationship_type": "Daughter",
                "is_mpoa": true,
                "access_level": "full",
                "permissions": { "can_view_records": true, "can_message": true, "can_schedule": false, "can_manage_medications": true }
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let invitation: CaregiverInvitationResponse = response.json();
        assert_eq!(invitation.relationship_type, "daughter");

        let (c_name, c_value) = add_auth_header(&caregiver);
        let listed: CaregiverInvitationListResponse = app
            .get("/api/v1/caregiver-invitations")
            .add_header(&c_name, &c_value)
            .await
            .json();
        assert_eq!(listed.received.len(), 1);
        assert_eq!(listed.received[0].patient_name.as_deref(), Some(patient.full_name().as_str()));

        let accepted: CaregiverInvitationResponse = app
            .post(&format!("/api/v1/caregiver-invitations/{}/accept", invitation.id))
            .add_header(&c_name, &c_value)
            .await
            .json();
        assert_eq!(accepted.status, InvitationStatus::Accepted);

        let linked: bool = sqlx::query_scalar(
            "SELECT can_manage_medications FROM patient_caregivers WHERE patient_id = $1 AND revoked_at IS NULL",
        )
        .bind(invitation.patient_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(linked);
    }
}
