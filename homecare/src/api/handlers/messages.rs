use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        messages::{ListMessagesQuery, MessageCreate, MessageDetailResponse, MessageFolder, MessageReply, MessageResponse},
        profiles::CurrentUser,
    },
    db::{
        handlers::{Messages, Notifications, Profiles, Repository, RoleRecords},
        models::{
            messages::{MessageCreateDBRequest, MessageDBResponse},
            notifications::NotificationCreateDBRequest,
        },
    },
    errors::{Error, Result},
    types::MessageId,
};

fn non_empty_body(body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(Error::BadRequest {
            message: "Message body cannot be empty".to_string(),
        });
    }
    Ok(body.to_string())
}

/// Insert the message and notify its recipient.
async fn deliver(conn: &mut PgConnection, sender: &CurrentUser, request: &MessageCreateDBRequest) -> Result<MessageDBResponse> {
    let message = Messages::new(&mut *conn).create(request).await?;
    Notifications::new(&mut *conn)
        .create(&NotificationCreateDBRequest::new_message(request.recipient_id, &sender.full_name()))
        .await?;
    tracing::debug!(message_id = %message.id, recipient_id = %request.recipient_id, "message delivered");
    Ok(message)
}

/// List the caller's inbox or sent messages, newest first
#[utoipa::path(
    get,
    path = "/messages",
    tag = "messages",
    params(ListMessagesQuery),
    responses(
        (status = 200, description = "Messages with participant names", body = [MessageDetailResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(folder = ?query.folder))]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<MessageDetailResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Messages::new(&mut conn);
    let rows = match query.folder {
        MessageFolder::Inbox => repo.inbox(current_user.id, skip, limit).await?,
        MessageFolder::Sent => repo.sent(current_user.id, skip, limit).await?,
    };
    Ok(Json(rows.into_iter().map(MessageDetailResponse::from).collect()))
}

/// Send a message to another profile
#[utoipa::path(
    post,
    path = "/messages",
    tag = "messages",
    request_body = MessageCreate,
    responses(
        (status = 201, description = "Message sent", body = MessageResponse),
        (status = 400, description = "Empty body or messaging yourself"),
        (status = 404, description = "Recipient or patient not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(recipient_id = %request.recipient_id))]
pub async fn send_message(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<MessageCreate>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let body = non_empty_body(&request.body)?;
    if request.recipient_id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot send a message to yourself".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if Profiles::new(&mut tx).get_by_id(request.recipient_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Profile".to_string(),
            id: request.recipient_id.to_string(),
        });
    }
    if let Some(patient_id) = request.patient_context_id
        && RoleRecords::new(&mut tx).get_patient(patient_id).await?.is_none()
    {
        return Err(Error::NotFound {
            resource: "Patient".to_string(),
            id: patient_id.to_string(),
        });
    }

    let message = deliver(
        &mut tx,
        &current_user,
        &MessageCreateDBRequest {
            sender_id: current_user.id,
            recipient_id: request.recipient_id,
            subject: request.subject.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            body,
            parent_message_id: None,
            patient_context_id: request.patient_context_id,
        },
    )
    .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(message.into())))
}

/// Read a message; opening it as the recipient marks it read
#[utoipa::path(
    get,
    path = "/messages/{message_id}",
    tag = "messages",
    params(("message_id" = uuid::Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message", body = MessageDetailResponse),
        (status = 404, description = "Message not found or not addressed to the caller"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(message_id = %message_id))]
pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<MessageId>,
    current_user: CurrentUser,
) -> Result<Json<MessageDetailResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Messages::new(&mut conn);
    let not_found = || Error::NotFound {
        resource: "Message".to_string(),
        id: message_id.to_string(),
    };

    let mut row = repo.get_with_participants(message_id).await?.ok_or_else(not_found)?;
    let is_recipient = row.message.recipient_id == current_user.id;
    if !is_recipient && row.message.sender_id != current_user.id {
        return Err(not_found());
    }

    if is_recipient && !row.message.is_read && repo.mark_read(message_id, current_user.id).await? {
        row = repo.get_with_participants(message_id).await?.ok_or_else(not_found)?;
    }
    Ok(Json(row.into()))
}

/// Reply to a received message
///
/// The reply goes back to the original sender with a `Re:` subject, and the original is marked read.
#[utoipa::path(
    post,
    path = "/messages/{message_id}/replies",
    tag = "messages",
    request_body = MessageReply,
    params(("message_id" = uuid::Uuid, Path, description = "Message being replied to")),
    responses(
        (status = 201, description = "Reply sent", body = MessageResponse),
        (status = 400, description = "Empty body"),
        (status = 404, description = "Message not found or not addressed to the caller"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(message_id = %message_id))]
pub async fn reply_to_message(
    State(state): State<AppState>,
    Path(message_id): Path<MessageId>,
    current_user: CurrentUser,
    Json(request): Json<MessageReply>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let body = non_empty_body(&request.body)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let original = Messages::new(&mut tx)
        .get_by_id(message_id)
        .await?
        .filter(|m| m.recipient_id == current_user.id)
        .ok_or_else(|| Error::NotFound {
            resource: "Message".to_string(),
            id: message_id.to_string(),
        })?;

    let reply = deliver(
        &mut tx,
        &current_user,
        &MessageCreateDBRequest {
            sender_id: current_user.id,
            recipient_id: original.sender_id,
            subject: Some(original.reply_subject()),
            body,
            parent_message_id: Some(original.id),
            patient_context_id: original.patient_context_id,
        },
    )
    .await?;
    Messages::new(&mut tx).mark_read(original.id, current_user.id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(reply.into())))
}
