use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, Extension, Json};
use sqlx::SqlitePool;

use crate::{
    authentication::AuthUser,
    data_formats::{MultipleReviewsWrapper, ReviewRequest, ReviewResponse, ReviewWrapper},
    db_helpers::{delete_review_in_db, leave_review_in_db, list_reviews_in_db},
    errors::RequestError,
};

use super::{EmptyResult, JsonResult};

pub async fn list_reviews(
    Extension(pool): Extension<Arc<SqlitePool>>,
    _user: AuthUser,
    Path(username): Path<String>,
) -> JsonResult<MultipleReviewsWrapper> {
    let (reviews, average_rating) = list_reviews_in_db(&pool, &username).await?;
    Ok(Json(MultipleReviewsWrapper {
        reviews: reviews.into_iter().map(Into::into).collect(),
        average_rating,
    }))
}

/// 201 for a new review, 200 when an existing one was rewritten.
pub async fn leave_review(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(username): Path<String>,
    Json(ReviewWrapper { review: request }): Json<ReviewWrapper<ReviewRequest>>,
) -> Result<(StatusCode, Json<ReviewWrapper<ReviewResponse>>), RequestError> {
    let (review, created) = leave_review_in_db(
        &pool,
        user.id,
        &username,
        request.rating,
        &request.comment,
    )
    .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ReviewWrapper {
            review: review.into(),
        }),
    ))
}

pub async fn delete_review(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(review_id): Path<i64>,
) -> EmptyResult {
    delete_review_in_db(&pool, user.id, review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
