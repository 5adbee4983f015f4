use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::{
    authentication::AuthUser,
    data_formats::{
        CommentRequest, CommentResponse, CommentWrapper, FeedQueryParams, LikeWrapper,
        MultiplePostsWrapper, PostRequest, PostResponse, PostWrapper,
    },
    db_helpers::{
        comment_post_in_db, create_post_in_db, delete_post_comment_in_db, delete_post_in_db,
        get_post_in_db, list_feed_in_db, toggle_like_in_db, Pagination,
    },
};

use super::{EmptyResult, JsonResult};

type PostJson = PostWrapper<PostResponse>;

pub async fn get_feed(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Query(params): Query<FeedQueryParams>,
) -> JsonResult<MultiplePostsWrapper> {
    let page = Pagination::new(params.limit, params.offset);
    let (posts, posts_count) = list_feed_in_db(&pool, user.id, page).await?;
    Ok(Json(MultiplePostsWrapper {
        posts: posts.into_iter().map(Into::into).collect(),
        posts_count,
    }))
}

pub async fn create_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Json(PostWrapper { post: request }): Json<PostWrapper<PostRequest>>,
) -> JsonResult<PostJson> {
    request.validate()?;
    let post = create_post_in_db(&pool, user.id, request).await?;
    Ok(Json(PostWrapper { post: post.into() }))
}

pub async fn get_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> JsonResult<PostJson> {
    let (post, comments) = get_post_in_db(&pool, user.id, post_id).await?;
    Ok(Json(PostWrapper {
        post: PostResponse::with_comments(post, comments),
    }))
}

pub async fn delete_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> EmptyResult {
    delete_post_in_db(&pool, user.id, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> JsonResult<LikeWrapper> {
    let (liked, likes_count) = toggle_like_in_db(&pool, user.id, post_id).await?;
    Ok(Json(LikeWrapper { liked, likes_count }))
}

pub async fn comment_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
    Json(CommentWrapper { comment: request }): Json<CommentWrapper<CommentRequest>>,
) -> JsonResult<CommentWrapper<CommentResponse>> {
    let comment = comment_post_in_db(&pool, user.id, post_id, &request.content).await?;
    Ok(Json(CommentWrapper {
        comment: comment.into(),
    }))
}

pub async fn delete_post_comment(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(comment_id): Path<i64>,
) -> EmptyResult {
    delete_post_comment_in_db(&pool, user.id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
