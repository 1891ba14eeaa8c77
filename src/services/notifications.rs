use diesel::{QueryResult, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::info;

use crate::{
    models::{NewNotificationEntity, NotificationEntity},
    schema::notifications,
};

/// Persists a notification for `user_id`. Callers inside a transaction pass the
/// transaction's connection so the notification commits or rolls back with it.
pub async fn notify(
    conn: &mut AsyncPgConnection,
    user_id: i32,
    title: impl Into<String>,
    message: impl Into<String>,
) -> QueryResult<NotificationEntity> {
    let notification: NotificationEntity = diesel::insert_into(notifications::table)
        .values(NewNotificationEntity {
            user_id,
            title: title.into(),
            message: message.into(),
        })
        .returning(NotificationEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(
        user_id,
        notification_id = notification.id,
        title = %notification.title,
        "Notification created"
    );
    Ok(notification)
}
