use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    errors::RequestError,
    models::{Friendship, Notification, NotificationType},
};

use super::begin_write;

/// A notification about to be written. Fan-out helpers below build these
/// and write them on the caller's connection so they share its transaction.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub sender_id: Option<i64>,
    pub notification_type: NotificationType,
    pub text: String,
    pub link: String,
}

pub(crate) async fn create_notification(
    conn: &mut SqliteConnection,
    notification: NewNotification,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO notifications (recipient_id, sender_id, notification_type, text, link)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(notification.recipient_id)
    .bind(notification.sender_id)
    .bind(notification.notification_type)
    .bind(notification.text)
    .bind(notification.link)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn notify_friend_request(
    conn: &mut SqliteConnection,
    from_user_id: i64,
    to_user_id: i64,
    from_username: &str,
) -> Result<(), sqlx::Error> {
    create_notification(
        conn,
        NewNotification {
            recipient_id: to_user_id,
            sender_id: Some(from_user_id),
            notification_type: NotificationType::FriendRequest,
            text: format!("{from_username} sent you a friend request"),
            link: "/friend-requests".to_owned(),
        },
    )
    .await
}

pub(crate) async fn notify_friend_accept(
    conn: &mut SqliteConnection,
    friendship: &Friendship,
    accepter_username: &str,
) -> Result<(), sqlx::Error> {
    create_notification(
        conn,
        NewNotification {
            recipient_id: friendship.from_user_id,
            sender_id: Some(friendship.to_user_id),
            notification_type: NotificationType::FriendAccept,
            text: format!("{accepter_username} accepted your friend request"),
            link: format!("/profiles/{accepter_username}"),
        },
    )
    .await
}

pub(crate) async fn notify_follow(
    conn: &mut SqliteConnection,
    follower_id: i64,
    following_id: i64,
    follower_username: &str,
) -> Result<(), sqlx::Error> {
    create_notification(
        conn,
        NewNotification {
            recipient_id: following_id,
            sender_id: Some(follower_id),
            notification_type: NotificationType::Follow,
            text: format!("{follower_username} started following you"),
            link: format!("/profiles/{follower_username}"),
        },
    )
    .await
}

/// One notification per participant other than the sender.
pub(crate) async fn notify_new_message(
    conn: &mut SqliteConnection,
    sender_id: i64,
    sender_username: &str,
    conversation_id: i64,
) -> Result<(), sqlx::Error> {
    let recipients: Vec<(i64,)> = sqlx::query_as(
        "SELECT user_id FROM conversation_participants WHERE conversation_id = $1 AND user_id <> $2",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .fetch_all(&mut *conn)
    .await?;
    for (recipient_id,) in recipients {
        create_notification(
            conn,
            NewNotification {
                recipient_id,
                sender_id: Some(sender_id),
                notification_type: NotificationType::Message,
                text: format!("{sender_username} sent you a message"),
                link: format!("/conversations/{conversation_id}"),
            },
        )
        .await?;
    }
    Ok(())
}

/// Every member of the group except the author.
pub(crate) async fn notify_group_post(
    conn: &mut SqliteConnection,
    group_id: i64,
    group_name: &str,
    author_id: i64,
    author_username: &str,
) -> Result<(), sqlx::Error> {
    let members: Vec<(i64,)> = sqlx::query_as(
        "SELECT user_id FROM group_memberships WHERE group_id = $1 AND user_id <> $2",
    )
    .bind(group_id)
    .bind(author_id)
    .fetch_all(&mut *conn)
    .await?;
    for (recipient_id,) in members {
        create_notification(
            conn,
            NewNotification {
                recipient_id,
                sender_id: Some(author_id),
                notification_type: NotificationType::GroupPost,
                text: format!("{author_username} created a new post in group \"{group_name}\""),
                link: format!("/groups/{group_id}"),
            },
        )
        .await?;
    }
    Ok(())
}

/// Skipped when authors comment on their own post.
pub(crate) async fn notify_new_comment(
    conn: &mut SqliteConnection,
    post_author_id: i64,
    comment_author_id: i64,
    comment_author_username: &str,
    link: String,
) -> Result<(), sqlx::Error> {
    if post_author_id == comment_author_id {
        return Ok(());
    }
    create_notification(
        conn,
        NewNotification {
            recipient_id: post_author_id,
            sender_id: Some(comment_author_id),
            notification_type: NotificationType::Comment,
            text: format!("{comment_author_username} commented on your post"),
            link,
        },
    )
    .await
}

pub(crate) async fn notify_post_like(
    conn: &mut SqliteConnection,
    post_id: i64,
    post_author_id: i64,
    liker_id: i64,
    liker_username: &str,
) -> Result<(), sqlx::Error> {
    if post_author_id == liker_id {
        return Ok(());
    }
    create_notification(
        conn,
        NewNotification {
            recipient_id: post_author_id,
            sender_id: Some(liker_id),
            notification_type: NotificationType::Like,
            text: format!("{liker_username} liked your post"),
            link: format!("/posts/{post_id}"),
        },
    )
    .await
}

pub(crate) async fn notify_new_review(
    conn: &mut SqliteConnection,
    reviewer_id: i64,
    reviewer_username: &str,
    reviewed_user_id: i64,
    reviewed_username: &str,
    rating: i64,
) -> Result<(), sqlx::Error> {
    create_notification(
        conn,
        NewNotification {
            recipient_id: reviewed_user_id,
            sender_id: Some(reviewer_id),
            notification_type: NotificationType::Review,
            text: format!("{reviewer_username} left you a review ({rating}★)"),
            link: format!("/profiles/{reviewed_username}"),
        },
    )
    .await
}

const NOTIFICATION_QUERY: &str = r#"
        SELECT notifications.id, notifications.recipient_id, notifications.sender_id,
               users.username AS sender_username, notifications.notification_type,
               notifications.text, notifications.link, notifications.is_read,
               notifications.created_at
        FROM notifications
        LEFT JOIN users ON users.id = notifications.sender_id
        WHERE notifications.recipient_id = $1
        ORDER BY notifications.created_at DESC, notifications.id DESC
"#;

/// Newest first, with the number still unread.
pub async fn list_notifications_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<(Vec<Notification>, i64), RequestError> {
    let mut tx = pool.begin().await?;
    let notifications = sqlx::query_as::<Sqlite, Notification>(NOTIFICATION_QUERY)
        .bind(user_id)
        .fetch_all(&mut tx)
        .await?;
    let (unread,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = 0",
    )
    .bind(user_id)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok((notifications, unread))
}

pub async fn mark_all_notifications_read_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<u64, RequestError> {
    let mut tx = begin_write(pool).await?;
    let result =
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE recipient_id = $1 AND is_read = 0")
            .bind(user_id)
            .execute(&mut tx)
            .await?;
    tx.commit().await?;
    Ok(result.rows_affected())
}

pub async fn mark_notification_read_in_db(
    pool: &SqlitePool,
    user_id: i64,
    notification_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    let result =
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1 AND recipient_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(&mut tx)
            .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("Notification not found"));
    }
    tx.commit().await?;
    Ok(())
}

/// Only the recipient may delete; anyone else sees a 404.
pub async fn delete_notification_in_db(
    pool: &SqlitePool,
    user_id: i64,
    notification_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
        .bind(notification_id)
        .bind(user_id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("Notification not found"));
    }
    tx.commit().await?;
    Ok(())
}
