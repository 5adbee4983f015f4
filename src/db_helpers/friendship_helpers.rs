use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    errors::RequestError,
    models::{FriendRequest, Friendship, FriendshipStatus, UserSummary},
};

use super::{
    begin_write,
    notification_helpers::{notify_friend_accept, notify_friend_request},
    require_user,
};

const FRIENDSHIP_COLUMNS: &str = "id, from_user_id, to_user_id, status, created_at, updated_at";

/// What `send_friend_request_in_db` did with the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestOutcome {
    Created,
    AlreadyPending,
    Reopened,
    /// The target had already asked; the pair are now friends.
    Accepted,
}

/// The row between `a` and `b` in either direction.
pub(crate) async fn fetch_friendship_between(
    conn: &mut SqliteConnection,
    a: i64,
    b: i64,
) -> Result<Option<Friendship>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {FRIENDSHIP_COLUMNS} FROM friendships
        WHERE (from_user_id = $1 AND to_user_id = $2)
           OR (from_user_id = $2 AND to_user_id = $1)
        ORDER BY updated_at DESC
        LIMIT 1
        "#
    );
    sqlx::query_as::<Sqlite, Friendship>(&query)
        .bind(a)
        .bind(b)
        .fetch_optional(&mut *conn)
        .await
}

async fn fetch_friendship(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Friendship, RequestError> {
    let query = format!("SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE id = $1");
    sqlx::query_as::<Sqlite, Friendship>(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RequestError::NotFound("Friend request not found"))
}

async fn set_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: FriendshipStatus,
) -> Result<Friendship, RequestError> {
    sqlx::query(
        "UPDATE friendships SET status = $1, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = $2",
    )
    .bind(status)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    fetch_friendship(conn, id).await
}

pub async fn send_friend_request_in_db(
    pool: &SqlitePool,
    from_user_id: i64,
    to_user_id: i64,
) -> Result<(Friendship, FriendRequestOutcome), RequestError> {
    if from_user_id == to_user_id {
        return Err(RequestError::RunTimeError(
            "You cannot send a friend request to yourself",
        ));
    }
    let mut tx = begin_write(pool).await?;
    let sender = require_user(&mut tx, from_user_id).await?;
    require_user(&mut tx, to_user_id).await?;

    let existing = fetch_friendship_between(&mut tx, from_user_id, to_user_id).await?;
    let (friendship, outcome) = match existing {
        Some(f) if f.status == FriendshipStatus::Accepted => {
            return Err(RequestError::RunTimeError("You are already friends"));
        }
        Some(f) if f.status == FriendshipStatus::Pending && f.from_user_id == from_user_id => {
            (f, FriendRequestOutcome::AlreadyPending)
        }
        Some(f) if f.status == FriendshipStatus::Pending => {
            let accepted = set_status(&mut tx, f.id, FriendshipStatus::Accepted).await?;
            // The original requester learns their request was answered.
            notify_friend_accept(&mut tx, &accepted, &sender.username).await?;
            (accepted, FriendRequestOutcome::Accepted)
        }
        Some(f) if f.from_user_id == from_user_id => {
            let reopened = set_status(&mut tx, f.id, FriendshipStatus::Pending).await?;
            notify_friend_request(&mut tx, from_user_id, to_user_id, &sender.username).await?;
            (reopened, FriendRequestOutcome::Reopened)
        }
        other => {
            if let Some(rejected) = other {
                sqlx::query("DELETE FROM friendships WHERE id = $1")
                    .bind(rejected.id)
                    .execute(&mut tx)
                    .await?;
            }
            let query = format!(
                "INSERT INTO friendships (from_user_id, to_user_id) VALUES ($1, $2) RETURNING {FRIENDSHIP_COLUMNS}"
            );
            let created = sqlx::query_as::<Sqlite, Friendship>(&query)
                .bind(from_user_id)
                .bind(to_user_id)
                .fetch_one(&mut tx)
                .await?;
            notify_friend_request(&mut tx, from_user_id, to_user_id, &sender.username).await?;
            (created, FriendRequestOutcome::Created)
        }
    };
    tx.commit().await?;
    tracing::debug!(friendship_id = friendship.id, ?outcome, "friend request");
    Ok((friendship, outcome))
}

pub async fn accept_friend_request_in_db(
    pool: &SqlitePool,
    user_id: i64,
    friendship_id: i64,
) -> Result<Friendship, RequestError> {
    let mut tx = begin_write(pool).await?;
    let friendship = fetch_friendship(&mut tx, friendship_id).await?;
    if friendship.to_user_id != user_id {
        return Err(RequestError::Forbidden(
            "Only the recipient can answer this request",
        ));
    }
    if friendship.status != FriendshipStatus::Pending {
        return Err(RequestError::RunTimeError(
            "This friend request was already answered",
        ));
    }
    let accepted = set_status(&mut tx, friendship.id, FriendshipStatus::Accepted).await?;
    let accepter = require_user(&mut tx, user_id).await?;
    notify_friend_accept(&mut tx, &accepted, &accepter.username).await?;
    tx.commit().await?;
    Ok(accepted)
}

pub async fn reject_friend_request_in_db(
    pool: &SqlitePool,
    user_id: i64,
    friendship_id: i64,
) -> Result<Friendship, RequestError> {
    let mut tx = begin_write(pool).await?;
    let friendship = fetch_friendship(&mut tx, friendship_id).await?;
    if friendship.to_user_id != user_id {
        return Err(RequestError::Forbidden(
            "Only the recipient can answer this request",
        ));
    }
    if friendship.status != FriendshipStatus::Pending {
        return Err(RequestError::RunTimeError(
            "This friend request was already answered",
        ));
    }
    let rejected = set_status(&mut tx, friendship.id, FriendshipStatus::Rejected).await?;
    tx.commit().await?;
    Ok(rejected)
}

pub async fn remove_friend_in_db(
    pool: &SqlitePool,
    user_id: i64,
    friend_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    let result = sqlx::query(
        r#"
        DELETE FROM friendships
        WHERE status = 'accepted'
          AND ((from_user_id = $1 AND to_user_id = $2)
            OR (from_user_id = $2 AND to_user_id = $1))
        "#,
    )
    .bind(user_id)
    .bind(friend_id)
    .execute(&mut tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound("You are not friends with this user"));
    }
    tx.commit().await?;
    Ok(())
}

pub async fn list_friends_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<UserSummary>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, UserSummary>(
        r#"
        SELECT users.id, users.username, profiles.avatar
        FROM friendships
        JOIN users ON users.id = CASE WHEN friendships.from_user_id = $1
                                      THEN friendships.to_user_id
                                      ELSE friendships.from_user_id END
        LEFT JOIN profiles ON profiles.user_id = users.id
        WHERE friendships.status = 'accepted'
          AND (friendships.from_user_id = $1 OR friendships.to_user_id = $1)
        ORDER BY users.username
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}

/// Pending requests addressed to the user and sent by the user.
pub async fn list_friend_requests_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<(Vec<FriendRequest>, Vec<FriendRequest>), RequestError> {
    let mut tx = pool.begin().await?;
    let incoming = sqlx::query_as::<Sqlite, FriendRequest>(
        r#"
        SELECT friendships.id, users.id AS user_id, users.username, profiles.avatar,
               friendships.status, friendships.created_at
        FROM friendships
        JOIN users ON users.id = friendships.from_user_id
        LEFT JOIN profiles ON profiles.user_id = users.id
        WHERE friendships.to_user_id = $1 AND friendships.status = 'pending'
        ORDER BY friendships.created_at DESC, friendships.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut tx)
    .await?;
    let outgoing = sqlx::query_as::<Sqlite, FriendRequest>(
        r#"
        SELECT friendships.id, users.id AS user_id, users.username, profiles.avatar,
               friendships.status, friendships.created_at
        FROM friendships
        JOIN users ON users.id = friendships.to_user_id
        LEFT JOIN profiles ON profiles.user_id = users.id
        WHERE friendships.from_user_id = $1 AND friendships.status = 'pending'
        ORDER BY friendships.created_at DESC, friendships.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut tx)
    .await?;
    tx.commit().await?;
    Ok((incoming, outgoing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::test_support::{create_user, test_pool};

    async fn count_rows(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM friendships")
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn second_request_does_not_duplicate() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;

        let (first, outcome) = send_friend_request_in_db(&pool, alice, bob).await.unwrap();
        assert_eq!(outcome, FriendRequestOutcome::Created);
        let (second, outcome) = send_friend_request_in_db(&pool, alice, bob).await.unwrap();
        assert_eq!(outcome, FriendRequestOutcome::AlreadyPending);
        assert_eq!(first.id, second.id);
        assert_eq!(count_rows(&pool).await, 1);
    }

    #[tokio::test]
    async fn accept_is_symmetric_and_happens_once() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let (request, _) = send_friend_request_in_db(&pool, alice, bob).await.unwrap();

        let err = accept_friend_request_in_db(&pool, alice, request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Forbidden(_)));

        let accepted = accept_friend_request_in_db(&pool, bob, request.id)
            .await
            .unwrap();
        assert_eq!(accepted.status, FriendshipStatus::Accepted);

        let err = accept_friend_request_in_db(&pool, bob, request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::RunTimeError(_)));

        let alice_friends = list_friends_in_db(&pool, alice).await.unwrap();
        let bob_friends = list_friends_in_db(&pool, bob).await.unwrap();
        assert_eq!(alice_friends[0].id, bob);
        assert_eq!(bob_friends[0].id, alice);
    }

    #[tokio::test]
    async fn mutual_request_becomes_friendship() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        send_friend_request_in_db(&pool, alice, bob).await.unwrap();
        let (friendship, outcome) = send_friend_request_in_db(&pool, bob, alice).await.unwrap();
        assert_eq!(outcome, FriendRequestOutcome::Accepted);
        assert_eq!(friendship.status, FriendshipStatus::Accepted);
        assert_eq!(count_rows(&pool).await, 1);

        let err = send_friend_request_in_db(&pool, alice, bob).await.unwrap_err();
        assert!(matches!(err, RequestError::RunTimeError(_)));
    }

    #[tokio::test]
    async fn rejected_request_can_be_sent_again() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let (request, _) = send_friend_request_in_db(&pool, alice, bob).await.unwrap();
        reject_friend_request_in_db(&pool, bob, request.id).await.unwrap();

        let (again, outcome) = send_friend_request_in_db(&pool, alice, bob).await.unwrap();
        assert_eq!(outcome, FriendRequestOutcome::Reopened);
        assert_eq!(again.id, request.id);
        assert_eq!(again.status, FriendshipStatus::Pending);

        reject_friend_request_in_db(&pool, bob, request.id).await.unwrap();
        let (reverse, outcome) = send_friend_request_in_db(&pool, bob, alice).await.unwrap();
        assert_eq!(outcome, FriendRequestOutcome::Created);
        assert_eq!(reverse.from_user_id, bob);
        assert_eq!(count_rows(&pool).await, 1);
    }

    #[tokio::test]
    async fn self_request_is_rejected() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let err = send_friend_request_in_db(&pool, alice, alice)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::RunTimeError(_)));
    }

    #[tokio::test]
    async fn remove_friend_works_from_either_side() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let (request, _) = send_friend_request_in_db(&pool, alice, bob).await.unwrap();
        accept_friend_request_in_db(&pool, bob, request.id).await.unwrap();

        remove_friend_in_db(&pool, bob, alice).await.unwrap();
        assert!(list_friends_in_db(&pool, alice).await.unwrap().is_empty());
        let err = remove_friend_in_db(&pool, alice, bob).await.unwrap_err();
        assert!(matches!(err, RequestError::NotFound(_)));
    }

    #[tokio::test]
    async fn pending_requests_are_split_by_direction() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let carol = create_user(&pool, "carol").await;
        send_friend_request_in_db(&pool, alice, bob).await.unwrap();
        send_friend_request_in_db(&pool, carol, alice).await.unwrap();

        let (incoming, outgoing) = list_friend_requests_in_db(&pool, alice).await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].username, "carol");
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].username, "bob");
    }
}
