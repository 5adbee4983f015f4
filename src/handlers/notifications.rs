use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, Extension, Json};
use sqlx::SqlitePool;

use crate::{
    authentication::AuthUser,
    data_formats::{MarkedReadWrapper, NotificationsWrapper},
    db_helpers::{
        delete_notification_in_db, list_notifications_in_db, mark_all_notifications_read_in_db,
        mark_notification_read_in_db,
    },
};

use super::{EmptyResult, JsonResult};

pub async fn list_notifications(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
) -> JsonResult<NotificationsWrapper> {
    let (notifications, unread_count) = list_notifications_in_db(&pool, user.id).await?;
    Ok(Json(NotificationsWrapper {
        notifications: notifications.into_iter().map(Into::into).collect(),
        unread_count,
    }))
}

pub async fn mark_all_notifications_read(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
) -> JsonResult<MarkedReadWrapper> {
    let updated = mark_all_notifications_read_in_db(&pool, user.id).await?;
    Ok(Json(MarkedReadWrapper { updated }))
}

pub async fn mark_notification_read(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(notification_id): Path<i64>,
) -> EmptyResult {
    mark_notification_read_in_db(&pool, user.id, notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_notification(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(notification_id): Path<i64>,
) -> EmptyResult {
    delete_notification_in_db(&pool, user.id, notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
