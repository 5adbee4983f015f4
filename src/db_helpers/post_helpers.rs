use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    data_formats::PostRequest,
    errors::RequestError,
    models::{Comment, Post},
};

use super::{
    are_friends, begin_write, is_following,
    notification_helpers::{notify_new_comment, notify_post_like},
    require_user, Pagination,
};

const POST_QUERY: &str = r#"
        SELECT posts.id, posts.author_id, users.username AS author_username,
               posts.content, posts.image, posts.created_at, posts.updated_at,
               (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = posts.id)    AS likes_count,
               (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = posts.id) AS comments_count,
               EXISTS (SELECT 1 FROM post_likes l
                       WHERE l.post_id = posts.id AND l.user_id = $1)           AS liked
        FROM posts
        JOIN users ON users.id = posts.author_id
"#;

// Posts by the viewer, by users they follow and by their friends.
const FEED_FILTER: &str = r#"
        WHERE posts.author_id = $1
           OR posts.author_id IN (SELECT following_id FROM follows WHERE follower_id = $1)
           OR posts.author_id IN (
                SELECT CASE WHEN from_user_id = $1 THEN to_user_id ELSE from_user_id END
                FROM friendships
                WHERE status = 'accepted' AND (from_user_id = $1 OR to_user_id = $1))
"#;

const COMMENT_QUERY: &str = r#"
        SELECT post_comments.id, post_comments.post_id, post_comments.author_id,
               users.username AS author_username, post_comments.content,
               post_comments.created_at
        FROM post_comments
        JOIN users ON users.id = post_comments.author_id
"#;

async fn fetch_post(
    conn: &mut SqliteConnection,
    viewer_id: i64,
    post_id: i64,
) -> Result<Post, RequestError> {
    let query = format!("{POST_QUERY} WHERE posts.id = $2");
    sqlx::query_as::<Sqlite, Post>(&query)
        .bind(viewer_id)
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RequestError::NotFound("Post not found"))
}

/// Same rule as the feed: own posts, friends' posts, followed users' posts.
async fn fetch_visible_post(
    conn: &mut SqliteConnection,
    viewer_id: i64,
    post_id: i64,
) -> Result<Post, RequestError> {
    let post = fetch_post(conn, viewer_id, post_id).await?;
    if post.author_id == viewer_id
        || is_following(conn, viewer_id, post.author_id).await?
        || are_friends(conn, viewer_id, post.author_id).await?
    {
        Ok(post)
    } else {
        Err(RequestError::Forbidden(
            "Only friends and followers can see this post",
        ))
    }
}

async fn fetch_comments(
    conn: &mut SqliteConnection,
    post_id: i64,
) -> Result<Vec<Comment>, sqlx::Error> {
    let query = format!(
        "{COMMENT_QUERY} WHERE post_comments.post_id = $1 ORDER BY post_comments.created_at, post_comments.id"
    );
    sqlx::query_as::<Sqlite, Comment>(&query)
        .bind(post_id)
        .fetch_all(&mut *conn)
        .await
}

/// One page of the feed plus the number of posts in the whole feed.
pub async fn list_feed_in_db(
    pool: &SqlitePool,
    viewer_id: i64,
    Pagination { limit, offset }: Pagination,
) -> Result<(Vec<Post>, i64), RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        "{POST_QUERY} {FEED_FILTER} ORDER BY posts.created_at DESC, posts.id DESC LIMIT $2 OFFSET $3"
    );
    let posts = sqlx::query_as::<Sqlite, Post>(&query)
        .bind(viewer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut tx)
        .await?;
    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM posts {FEED_FILTER}"))
        .bind(viewer_id)
        .fetch_one(&mut tx)
        .await?;
    tx.commit().await?;
    Ok((posts, total))
}

pub async fn create_post_in_db(
    pool: &SqlitePool,
    user_id: i64,
    PostRequest { content, image }: PostRequest,
) -> Result<Post, RequestError> {
    let mut tx = begin_write(pool).await?;
    let (post_id,): (i64,) = sqlx::query_as(
        "INSERT INTO posts (author_id, content, image) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(content.trim())
    .bind(image.filter(|i| !i.trim().is_empty()))
    .fetch_one(&mut tx)
    .await?;
    let post = fetch_post(&mut tx, user_id, post_id).await?;
    tx.commit().await?;
    Ok(post)
}

pub async fn get_post_in_db(
    pool: &SqlitePool,
    viewer_id: i64,
    post_id: i64,
) -> Result<(Post, Vec<Comment>), RequestError> {
    let mut tx = pool.begin().await?;
    let post = fetch_visible_post(&mut tx, viewer_id, post_id).await?;
    let comments = fetch_comments(&mut tx, post_id).await?;
    tx.commit().await?;
    Ok((post, comments))
}

pub async fn delete_post_in_db(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    let post = fetch_post(&mut tx, user_id, post_id).await?;
    if post.author_id != user_id {
        return Err(RequestError::Forbidden("You can only delete your own posts"));
    }
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Likes the post, or removes the like if it already exists.
/// Returns the new liked state and like count.
pub async fn toggle_like_in_db(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
) -> Result<(bool, i64), RequestError> {
    let mut tx = begin_write(pool).await?;
    let post = fetch_visible_post(&mut tx, user_id, post_id).await?;

    let liked = if post.liked {
        sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut tx)
            .await?;
        false
    } else {
        sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2)")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut tx)
            .await?;
        let liker = require_user(&mut tx, user_id).await?;
        notify_post_like(&mut tx, post_id, post.author_id, user_id, &liker.username).await?;
        true
    };
    let (likes_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(&mut tx)
        .await?;
    tx.commit().await?;
    Ok((liked, likes_count))
}

pub async fn comment_post_in_db(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
    content: &str,
) -> Result<Comment, RequestError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(RequestError::RunTimeError("Comment cannot be empty"));
    }
    let mut tx = begin_write(pool).await?;
    let post = fetch_visible_post(&mut tx, user_id, post_id).await?;
    let author = require_user(&mut tx, user_id).await?;

    let (comment_id,): (i64,) = sqlx::query_as(
        "INSERT INTO post_comments (post_id, author_id, content) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(post_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(&mut tx)
    .await?;
    notify_new_comment(
        &mut tx,
        post.author_id,
        user_id,
        &author.username,
        format!("/posts/{post_id}"),
    )
    .await?;
    let query = format!("{COMMENT_QUERY} WHERE post_comments.id = $1");
    let comment = sqlx::query_as::<Sqlite, Comment>(&query)
        .bind(comment_id)
        .fetch_one(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(comment)
}

/// The comment's author or the post's author.
pub async fn delete_post_comment_in_db(
    pool: &SqlitePool,
    user_id: i64,
    comment_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    let owners: Option<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT post_comments.author_id, posts.author_id
        FROM post_comments
        JOIN posts ON posts.id = post_comments.post_id
        WHERE post_comments.id = $1
        "#,
    )
    .bind(comment_id)
    .fetch_optional(&mut tx)
    .await?;
    let (comment_author, post_author) = match owners {
        Some(owners) => owners,
        None => return Err(RequestError::NotFound("Comment not found")),
    };
    if user_id != comment_author && user_id != post_author {
        return Err(RequestError::Forbidden("You cannot delete this comment"));
    }
    sqlx::query("DELETE FROM post_comments WHERE id = $1")
        .bind(comment_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
