use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{errors::RequestError, models::Review};

use super::{begin_write, notification_helpers::notify_new_review, require_user, require_user_by_username};

const REVIEW_QUERY: &str = r#"
        SELECT reviews.id, reviews.reviewer_id, users.username AS reviewer_username,
               reviews.reviewed_user_id, reviews.rating, reviews.comment,
               reviews.created_at, reviews.updated_at
        FROM reviews
        JOIN users ON users.id = reviews.reviewer_id
"#;

async fn fetch_review(
    conn: &mut SqliteConnection,
    review_id: i64,
) -> Result<Option<Review>, sqlx::Error> {
    let query = format!("{REVIEW_QUERY} WHERE reviews.id = $1");
    sqlx::query_as::<Sqlite, Review>(&query)
        .bind(review_id)
        .fetch_optional(&mut *conn)
        .await
}

/// Creates the reviewer's review of `username`, or rewrites the existing one.
/// The flag is `true` when a new row was created.
pub async fn leave_review_in_db(
    pool: &SqlitePool,
    reviewer_id: i64,
    username: &str,
    rating: i64,
    comment: &str,
) -> Result<(Review, bool), RequestError> {
    if !(1..=5).contains(&rating) {
        return Err(RequestError::RunTimeError("Rating must be between 1 and 5"));
    }
    let mut tx = begin_write(pool).await?;
    let reviewed = require_user_by_username(&mut tx, username).await?;
    if reviewed.id == reviewer_id {
        return Err(RequestError::RunTimeError("You cannot review yourself"));
    }
    let reviewer = require_user(&mut tx, reviewer_id).await?;

    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM reviews WHERE reviewer_id = $1 AND reviewed_user_id = $2",
    )
    .bind(reviewer_id)
    .bind(reviewed.id)
    .fetch_optional(&mut tx)
    .await?;

    let (review_id, created) = match existing {
        Some((id,)) => {
            sqlx::query(
                r#"
                UPDATE reviews
                SET rating = $1, comment = $2, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                WHERE id = $3
                "#,
            )
            .bind(rating)
            .bind(comment.trim())
            .bind(id)
            .execute(&mut tx)
            .await?;
            (id, false)
        }
        None => {
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO reviews (reviewer_id, reviewed_user_id, rating, comment)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(reviewer_id)
            .bind(reviewed.id)
            .bind(rating)
            .bind(comment.trim())
            .fetch_one(&mut tx)
            .await?;
            (id, true)
        }
    };
    notify_new_review(
        &mut tx,
        reviewer_id,
        &reviewer.username,
        reviewed.id,
        &reviewed.username,
        rating,
    )
    .await?;

    let review = fetch_review(&mut tx, review_id)
        .await?
        .ok_or(RequestError::ServerError)?;
    tx.commit().await?;
    Ok((review, created))
}

/// Reviews of `username`, newest first, with their average rating.
pub async fn list_reviews_in_db(
    pool: &SqlitePool,
    username: &str,
) -> Result<(Vec<Review>, Option<f64>), RequestError> {
    let mut tx = pool.begin().await?;
    let user = require_user_by_username(&mut tx, username).await?;
    let query = format!(
        "{REVIEW_QUERY} WHERE reviews.reviewed_user_id = $1 ORDER BY reviews.created_at DESC, reviews.id DESC"
    );
    let reviews = sqlx::query_as::<Sqlite, Review>(&query)
        .bind(user.id)
        .fetch_all(&mut tx)
        .await?;
    let (average,): (Option<f64>,) =
        sqlx::query_as("SELECT AVG(rating) FROM reviews WHERE reviewed_user_id = $1")
            .bind(user.id)
            .fetch_one(&mut tx)
            .await?;
    tx.commit().await?;
    Ok((reviews, average))
}

pub async fn delete_review_in_db(
    pool: &SqlitePool,
    user_id: i64,
    review_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    let review = fetch_review(&mut tx, review_id)
        .await?
        .ok_or(RequestError::NotFound("Review not found"))?;
    if review.reviewer_id != user_id {
        return Err(RequestError::Forbidden("You can only delete your own reviews"));
    }
    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(review_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
