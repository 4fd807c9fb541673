use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        notifications::{ListNotificationsQuery, MarkAllReadResponse, NotificationListResponse, NotificationResponse},
        profiles::CurrentUser,
    },
    db::handlers::Notifications,
    errors::{Error, Result},
    types::NotificationId,
};

/// The caller's notifications, newest first, with their unread count
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Notifications", body = NotificationListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
    current_user: CurrentUser,
) -> Result<Json<NotificationListResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notifications::new(&mut conn);

    let notifications = repo
        .list_for_user(
            current_user.id,
            query.unread_only.unwrap_or(false),
            query.pagination.skip(),
            query.pagination.limit(),
        )
        .await?;
    let unread_count = repo.count_unread(current_user.id).await?;

    Ok(Json(NotificationListResponse {
        notifications: notifications.into_iter().map(NotificationResponse::from).collect(),
        unread_count,
    }))
}

#[utoipa::path(
    patch,
    path = "/notifications/{notification_id}/read",
    tag = "notifications",
    params(("notification_id" = uuid::Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationResponse),
        (status = 404, description = "Notification not found"),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all, fields(notification_id = %notification_id))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<NotificationId>,
    current_user: CurrentUser,
) -> Result<Json<NotificationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let notification = Notifications::new(&mut conn)
        .mark_read(notification_id, current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Notification".to_string(),
            id: notification_id.to_string(),
        })?;
    Ok(Json(notification.into()))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "Number of notifications marked read", body = MarkAllReadResponse),
    ),
    security(("CookieAuth" = []), ("X-Homecare-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_all_notifications_read(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<MarkAllReadResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let marked = Notifications::new(&mut conn).mark_all_read(current_user.id).await?;
    Ok(Json(MarkAllReadResponse { marked }))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{notifications::MarkAllReadResponse, profiles::Role},
        db::{handlers::Notifications, models::notifications::NotificationCreateDBRequest},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn unread_count_tracks_reads(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let caregiver = create_test_user(&pool, Role::Caregiver).await;
        let other = create_test_user(&pool, Role::Caregiver).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Notifications::new(&mut conn);
        let first = repo
            .create(&NotificationCreateDBRequest::new_message(caregiver.id, "Dana Lee"))
            .await
            .unwrap();
        for _ in 0..2 {
            repo.create(&NotificationCreateDBRequest::new_invitation(caregiver.id, Role::Patient))
                .await
                .unwrap();
        }
        drop(conn);

        let (name, value) = add_auth_header(&caregiver);
        let list: serde_json::Value = app.get("/api/v1/notifications").add_header(&name, &value).await.json();
        assert_eq!(list["unread_count"], 3);
        assert_eq!(list["notifications"].as_array().unwrap().len(), 3);

        app.patch(&format!("/api/v1/notifications/{}/read", first.id))
            .add_header(&name, &value)
            .await
            .assert_status_ok();
        let unread: serde_json::Value = app
            .get("/api/v1/notifications?unread_only=true")
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(unread["unread_count"], 2);
        assert_eq!(unread["notifications"].as_array().unwrap().len(), 2);

        // someone else's notification is invisible
        let (o_name, o_value) = add_auth_header(&other);
        app.patch(&format!("/api/v1/notifications/{}/read", first.id))
            .add_header(&o_name, &o_value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let marked: MarkAllReadResponse = app
            .post("/api/v1/notifications/read-all")
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(marked.marked, 2);
    }
}
