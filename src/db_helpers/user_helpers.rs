use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    models::{User, UserSummary},
};

use super::{begin_write, fetch_user_by_id, fetch_user_by_username, like_pattern, QueryBuilder, USER_COLUMNS};

/// Creates the account and its empty profile in one transaction.
pub async fn insert_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, RequestError> {
    let mut tx = begin_write(pool).await?;
    let query = format!(
        "INSERT INTO users (username, email, password) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<Sqlite, User>(&query)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut tx)
        .await
        .map_err(|e| RequestError::from(e).on_conflict("Username already exists"))?;

    sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
        .bind(user.id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    tracing::info!(user_id = user.id, username = %user.username, "registered user");
    Ok(user)
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = fetch_user_by_id(&mut tx, id).await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = fetch_user_by_username(&mut tx, username).await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn update_user_in_db(
    pool: &SqlitePool,
    id: i64,
    email: Option<String>,
    password_hash: Option<String>,
) -> Result<User, RequestError> {
    let mut tx = begin_write(pool).await?;
    QueryBuilder::update("users")
        .add_param("email", email)
        .add_param("password", password_hash)
        .execute(&mut tx, "id", id)
        .await?;

    let result = match fetch_user_by_id(&mut tx, id).await? {
        Some(user) => user,
        None => return Err(RequestError::NotFound("User not found")),
    };
    tx.commit().await?;
    Ok(result)
}

/// Grants the superuser flag to every listed username that exists.
pub async fn promote_superusers(
    pool: &SqlitePool,
    usernames: &[String],
) -> Result<u64, RequestError> {
    let mut tx = begin_write(pool).await?;
    let mut promoted = 0;
    for username in usernames {
        promoted += sqlx::query(
            "UPDATE users SET is_superuser = 1 WHERE username = $1 AND is_superuser = 0",
        )
        .bind(username)
        .execute(&mut tx)
        .await?
        .rows_affected();
    }
    tx.commit().await?;
    Ok(promoted)
}

pub async fn list_users_in_db(
    pool: &SqlitePool,
    viewer_id: i64,
    search: Option<&str>,
) -> Result<Vec<UserSummary>, RequestError> {
    let mut tx = pool.begin().await?;
    let pattern = search.filter(|s| !s.trim().is_empty()).map(like_pattern);
    let result = sqlx::query_as::<Sqlite, UserSummary>(
        r#"
        SELECT users.id, users.username, profiles.avatar
        FROM users
        LEFT JOIN profiles ON profiles.user_id = users.id
        WHERE users.id <> $1
          AND ($2 IS NULL OR users.username LIKE $2 ESCAPE '\')
        ORDER BY users.username
        "#,
    )
    .bind(viewer_id)
    .bind(pattern)
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
    async fn register_creates_profile() {
        let pool = test_pool().await;
        let id = create_user(&pool, "alice").await;
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles WHERE user_id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let pool = test_pool().await;
        create_user(&pool, "alice").await;
        let err = insert_user(&pool, "alice", "other@example.com", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::RunTimeError(_)));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_excludes_viewer() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        create_user(&pool, "Malice").await;
        create_user(&pool, "bob").await;

        let found = list_users_in_db(&pool, alice, Some("ALI")).await.unwrap();
        let names: Vec<_> = found.into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["Malice".to_string()]);

        let everyone = list_users_in_db(&pool, alice, None).await.unwrap();
        assert_eq!(everyone.len(), 2);
    }

    #[tokio::test]
    async fn superusers_are_promoted_once() {
        let pool = test_pool().await;
        create_user(&pool, "root").await;
        let names = vec!["root".to_string(), "ghost".to_string()];
        assert_eq!(promote_superusers(&pool, &names).await.unwrap(), 1);
        assert_eq!(promote_superusers(&pool, &names).await.unwrap(), 0);
        let root = get_user_by_username(&pool, "root").await.unwrap().unwrap();
        assert!(root.is_superuser);
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let pool = test_pool().await;
        let id = create_user(&pool, "alice").await;
        let user = update_user_in_db(&pool, id, Some("new@example.com".into()), None)
            .await
            .unwrap();
        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.password, "not-a-hash");
    }
}
