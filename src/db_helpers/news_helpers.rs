use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    data_formats::{NewsRequest, UpdateNewsRequest},
    errors::RequestError,
    models::News,
};

use super::{begin_write, require_user, QueryBuilder};

const NEWS_QUERY: &str = r#"
        SELECT news.id, news.title, news.content, news.image, news.author_id,
               users.username AS author_username, news.is_pinned,
               news.created_at, news.updated_at
        FROM news
        JOIN users ON users.id = news.author_id
"#;

async fn fetch_news(conn: &mut SqliteConnection, news_id: i64) -> Result<News, RequestError> {
    let query = format!("{NEWS_QUERY} WHERE news.id = $1");
    sqlx::query_as::<Sqlite, News>(&query)
        .bind(news_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RequestError::NotFound("News not found"))
}

async fn require_superuser(conn: &mut SqliteConnection, user_id: i64) -> Result<(), RequestError> {
    let user = require_user(conn, user_id).await?;
    if !user.is_superuser {
        return Err(RequestError::Forbidden("Only administrators can manage news"));
    }
    Ok(())
}

/// Pinned items first, then newest first.
pub async fn list_news_in_db(pool: &SqlitePool) -> Result<Vec<News>, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        "{NEWS_QUERY} ORDER BY news.is_pinned DESC, news.created_at DESC, news.id DESC"
    );
    let news = sqlx::query_as::<Sqlite, News>(&query)
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(news)
}

pub async fn get_news_in_db(pool: &SqlitePool, news_id: i64) -> Result<News, RequestError> {
    let mut tx = pool.begin().await?;
    let news = fetch_news(&mut tx, news_id).await?;
    tx.commit().await?;
    Ok(news)
}

pub async fn create_news_in_db(
    pool: &SqlitePool,
    user_id: i64,
    NewsRequest {
        title,
        content,
        image,
        is_pinned,
    }: NewsRequest,
) -> Result<News, RequestError> {
    let mut tx = begin_write(pool).await?;
    require_superuser(&mut tx, user_id).await?;
    let (news_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO news (title, content, image, author_id, is_pinned)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(title.trim())
    .bind(content.trim())
    .bind(image.filter(|i| !i.trim().is_empty()))
    .bind(user_id)
    .bind(is_pinned)
    .fetch_one(&mut tx)
    .await?;
    let news = fetch_news(&mut tx, news_id).await?;
    tx.commit().await?;
    tracing::info!(news_id, "published news");
    Ok(news)
}

pub async fn update_news_in_db(
    pool: &SqlitePool,
    user_id: i64,
    news_id: i64,
    UpdateNewsRequest {
        title,
        content,
        image,
        is_pinned,
    }: UpdateNewsRequest,
) -> Result<News, RequestError> {
    let mut tx = begin_write(pool).await?;
    require_superuser(&mut tx, user_id).await?;
    fetch_news(&mut tx, news_id).await?;
    QueryBuilder::update("news")
        .add_param("title", title.map(|t| t.trim().to_string()))
        .add_param("content", content.map(|c| c.trim().to_string()))
        .add_nullable("image", image)
        .add_param("is_pinned", is_pinned)
        .touch("updated_at")
        .execute(&mut tx, "id", news_id)
        .await?;
    let news = fetch_news(&mut tx, news_id).await?;
    tx.commit().await?;
    Ok(news)
}

pub async fn delete_news_in_db(
    pool: &SqlitePool,
    user_id: i64,
    news_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    require_superuser(&mut tx, user_id).await?;
    fetch_news(&mut tx, news_id).await?;
    sqlx::query("DELETE FROM news WHERE id = $1")
        .bind(news_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::promote_superusers;
    use crate::db_helpers::test_support::{create_user, test_pool};

    fn news(title: &str, is_pinned: bool) -> NewsRequest {
        NewsRequest {
            title: title.to_string(),
            content: "body".to_string(),
            image: None,
            is_pinned,
        }
    }

    #[tokio::test]
    async fn pinned_news_comes_first() {
        let pool = test_pool().await;
        let admin = create_user(&pool, "admin").await;
        promote_superusers(&pool, &["admin".to_string()]).await.unwrap();

        create_news_in_db(&pool, admin, news("pinned", true)).await.unwrap();
        create_news_in_db(&pool, admin, news("older", false)).await.unwrap();
        create_news_in_db(&pool, admin, news("newer", false)).await.unwrap();

        let titles: Vec<_> = list_news_in_db(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["pinned", "newer", "older"]);
    }

    #[tokio::test]
    async fn regular_users_cannot_manage_news() {
        let pool = test_pool().await;
        let admin = create_user(&pool, "admin").await;
        let alice = create_user(&pool, "alice").await;
        promote_superusers(&pool, &["admin".to_string()]).await.unwrap();
        let item = create_news_in_db(&pool, admin, news("hello", false)).await.unwrap();

        assert!(matches!(
            create_news_in_db(&pool, alice, news("nope", false)).await.unwrap_err(),
            RequestError::Forbidden(_)
        ));
        assert!(matches!(
            delete_news_in_db(&pool, alice, item.id).await.unwrap_err(),
            RequestError::Forbidden(_)
        ));
        assert_eq!(get_news_in_db(&pool, item.id).await.unwrap().title, "hello");
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let pool = test_pool().await;
        let admin = create_user(&pool, "admin").await;
        promote_superusers(&pool, &["admin".to_string()]).await.unwrap();
        let item = create_news_in_db(&pool, admin, news("hello", false)).await.unwrap();

        let updated = update_news_in_db(
            &pool,
            admin,
            item.id,
            UpdateNewsRequest {
                is_pinned: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.is_pinned);
        assert_eq!(updated.title, "hello");

        delete_news_in_db(&pool, admin, item.id).await.unwrap();
        assert!(matches!(
            get_news_in_db(&pool, item.id).await.unwrap_err(),
            RequestError::NotFound(_)
        ));
    }
}
