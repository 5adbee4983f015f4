use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::UserSummary};

use super::{begin_write, notification_helpers::notify_follow, require_user};

/// Returns `true` when a new edge was created; following twice is a no-op.
pub async fn follow_user_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    following_id: i64,
) -> Result<bool, RequestError> {
    if follower_id == following_id {
        return Err(RequestError::RunTimeError("You cannot follow yourself"));
    }
    let mut tx = begin_write(pool).await?;
    let follower = require_user(&mut tx, follower_id).await?;
    require_user(&mut tx, following_id).await?;

    let created = sqlx::query(
        r#"
        INSERT INTO follows (follower_id, following_id)
        VALUES ($1, $2)
        ON CONFLICT (follower_id, following_id) DO NOTHING
        "#,
    )
    .bind(follower_id)
    .bind(following_id)
    .execute(&mut tx)
    .await?
    .rows_affected()
        > 0;
    if created {
        notify_follow(&mut tx, follower_id, following_id, &follower.username).await?;
    }
    tx.commit().await?;
    Ok(created)
}

/// Returns `true` when an edge was removed.
pub async fn unfollow_user_in_db(
    pool: &SqlitePool,
    follower_id: i64,
    following_id: i64,
) -> Result<bool, RequestError> {
    let mut tx = begin_write(pool).await?;
    require_user(&mut tx, following_id).await?;
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(follower_id)
        .bind(following_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_followers_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<UserSummary>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, UserSummary>(
        r#"
        SELECT users.id, users.username, profiles.avatar
        FROM follows
        JOIN users ON users.id = follows.follower_id
        LEFT JOIN profiles ON profiles.user_id = users.id
        WHERE follows.following_id = $1
        ORDER BY follows.created_at DESC, follows.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn list_following_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<UserSummary>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, UserSummary>(
        r#"
        SELECT users.id, users.username, profiles.avatar
        FROM follows
        JOIN users ON users.id = follows.following_id
        LEFT JOIN profiles ON profiles.user_id = users.id
        WHERE follows.follower_id = $1
        ORDER BY follows.created_at DESC, follows.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::test_support::{create_user, test_pool};

    #[tokio::test]
    async fn follow_twice_keeps_one_edge() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;

        assert!(follow_user_in_db(&pool, alice, bob).await.unwrap());
        assert!(!follow_user_in_db(&pool, alice, bob).await.unwrap());

        let followers = list_followers_in_db(&pool, bob).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "alice");
        let following = list_following_in_db(&pool, alice).await.unwrap();
        assert_eq!(following.len(), 1);
    }

    #[tokio::test]
    async fn unfollow_removes_edge() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        follow_user_in_db(&pool, alice, bob).await.unwrap();

        assert!(unfollow_user_in_db(&pool, alice, bob).await.unwrap());
        assert!(!unfollow_user_in_db(&pool, alice, bob).await.unwrap());
        assert!(list_followers_in_db(&pool, bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cannot_follow_self_or_missing_user() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        assert!(matches!(
            follow_user_in_db(&pool, alice, alice).await.unwrap_err(),
            RequestError::RunTimeError(_)
        ));
        assert!(matches!(
            follow_user_in_db(&pool, alice, 999).await.unwrap_err(),
            RequestError::NotFound(_)
        ));
    }
}
