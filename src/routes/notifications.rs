use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::NotificationEntity,
    schema::{notifications, users},
    services,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/notifications",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_notifications, create_notification))
            .routes(utoipa_axum::routes!(read_all_notifications))
            .routes(utoipa_axum::routes!(
                get_notification,
                update_notification,
                delete_notification
            )),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct NotificationFilter {
    /// Only notifications that have not been read.
    unread: Option<bool>,
}

/// The caller's notifications, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Notifications"],
    security(("bearerAuth" = [])),
    params(NotificationFilter),
    responses(
        (status = 200, description = "List notifications", body = StdResponse<Vec<NotificationEntity>, String>)
    )
)]
async fn get_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<NotificationFilter>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = notifications::table
        .filter(notifications::user_id.eq(user.user_id))
        .select(NotificationEntity::as_select())
        .order_by(notifications::created_at.desc())
        .then_order_by(notifications::id.desc())
        .into_boxed();
    match filter.unread {
        Some(true) => query = query.filter(notifications::read_at.is_null()),
        Some(false) => query = query.filter(notifications::read_at.is_not_null()),
        None => {}
    }

    let notifications: Vec<NotificationEntity> = query
        .load(conn)
        .await
        .context("Failed to get notifications")?;

    Ok(StdResponse {
        data: Some(notifications),
        message: Some("Get notifications successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateNotificationReq {
    user_id: i32,
    #[validate(length(min = 1, max = 255, message = "The title field is required."))]
    title: String,
    #[validate(length(min = 1, message = "The message field is required."))]
    message: String,
}

/// Send a notification to a user. Admin only.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Notifications"],
    security(("bearerAuth" = [])),
    request_body = CreateNotificationReq,
    responses(
        (status = 201, description = "Created notification successfully", body = StdResponse<NotificationEntity, String>),
        (status = 403, description = "Not an admin", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_notification(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateNotificationReq>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_admin()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    users::table
        .find(body.user_id)
        .select(users::id)
        .get_result::<i32>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::field("user_id", "The selected user does not exist."))?;

    let notification =
        services::notifications::notify(conn, body.user_id, body.title, body.message).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(notification),
            message: Some("Created notification successfully"),
        },
    ))
}

/// Mark every unread notification of the caller as read.
#[utoipa::path(
    post,
    path = "/read-all",
    tags = ["Notifications"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Marked notifications as read", body = StdResponse<usize, String>)
    )
)]
async fn read_all_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let marked = diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(user.user_id))
            .filter(notifications::read_at.is_null()),
    )
    .set((
        notifications::read_at.eq(diesel::dsl::now),
        notifications::updated_at.eq(diesel::dsl::now),
    ))
    .execute(conn)
    .await?;

    Ok(StdResponse {
        data: Some(marked),
        message: Some("Marked notifications as read"),
    })
}

async fn load_own(
    conn: &mut AsyncPgConnection,
    user: &AuthUser,
    id: i32,
) -> Result<NotificationEntity, AppError> {
    let notification: NotificationEntity = notifications::table
        .find(id)
        .select(NotificationEntity::as_select())
        .get_result(conn)
        .await?;
    if notification.user_id != user.user_id {
        return Err(AppError::ForbiddenResource(
            "You do not have access to this notification".into(),
        ));
    }
    Ok(notification)
}

/// Fetch one of the caller's notifications.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Notifications"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID to fetch")
    ),
    responses(
        (status = 200, description = "Get notification successfully", body = StdResponse<NotificationEntity, String>)
    )
)]
async fn get_notification(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let notification = load_own(conn, &user, id).await?;

    Ok(StdResponse {
        data: Some(notification),
        message: Some("Get notification successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct UpdateNotificationReq {
    /// Defaults to marking the notification read.
    read: Option<bool>,
}

/// Mark a notification read or unread.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Notifications"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID to update")
    ),
    request_body = UpdateNotificationReq,
    responses(
        (status = 200, description = "Updated notification successfully", body = StdResponse<NotificationEntity, String>)
    )
)]
async fn update_notification(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateNotificationReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let notification = load_own(conn, &user, id).await?;

    let read_at: Option<DateTime<Utc>> = if body.read.unwrap_or(true) {
        Some(notification.read_at.unwrap_or_else(Utc::now))
    } else {
        None
    };

    let updated: NotificationEntity = diesel::update(notifications::table.find(id))
        .set((
            notifications::read_at.eq(read_at),
            notifications::updated_at.eq(diesel::dsl::now),
        ))
        .returning(NotificationEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated notification successfully"),
    })
}

/// Delete a notification.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Notifications"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted notification successfully", body = StdResponse<NotificationEntity, String>)
    )
)]
async fn delete_notification(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let notification: NotificationEntity = notifications::table
        .find(id)
        .select(NotificationEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(notification.user_id, "notification")?;

    let deleted: NotificationEntity = diesel::delete(notifications::table.find(id))
        .returning(NotificationEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted notification successfully"),
    })
}
