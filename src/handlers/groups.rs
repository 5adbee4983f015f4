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
        CommentRequest, CommentResponse, CommentWrapper, CreateGroupRequest, GroupDetailResponse,
        GroupPostResponse, GroupResponse, GroupWrapper, MultipleGroupsWrapper, PostRequest,
        PostWrapper, SearchParams, UpdateGroupRequest,
    },
    db_helpers::{
        add_group_member_in_db, comment_group_post_in_db, create_group_in_db,
        create_group_post_in_db, delete_group_in_db, delete_group_post_in_db,
        get_group_detail_in_db, join_group_in_db, leave_group_in_db, list_groups_in_db,
        update_group_in_db,
    },
};

use super::{EmptyResult, JsonResult};

type GroupJson = GroupWrapper<GroupResponse>;

pub async fn list_groups(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Query(params): Query<SearchParams>,
) -> JsonResult<MultipleGroupsWrapper> {
    let groups = list_groups_in_db(&pool, user.id, params.search.as_deref())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(MultipleGroupsWrapper { groups }))
}

pub async fn create_group(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Json(GroupWrapper { group: request }): Json<GroupWrapper<CreateGroupRequest>>,
) -> JsonResult<GroupJson> {
    request.validate()?;
    let group = create_group_in_db(&pool, user.id, request).await?;
    Ok(Json(GroupWrapper {
        group: group.into(),
    }))
}

pub async fn get_group(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(group_id): Path<i64>,
) -> JsonResult<GroupWrapper<GroupDetailResponse>> {
    let detail = get_group_detail_in_db(&pool, user.id, group_id).await?;
    Ok(Json(GroupWrapper {
        group: detail.into(),
    }))
}

pub async fn update_group(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(group_id): Path<i64>,
    Json(GroupWrapper { group: request }): Json<GroupWrapper<UpdateGroupRequest>>,
) -> JsonResult<GroupJson> {
    request.validate()?;
    let group = update_group_in_db(&pool, user.id, group_id, request).await?;
    Ok(Json(GroupWrapper {
        group: group.into(),
    }))
}

pub async fn delete_group(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(group_id): Path<i64>,
) -> EmptyResult {
    delete_group_in_db(&pool, user.id, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn join_group(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(group_id): Path<i64>,
) -> JsonResult<GroupJson> {
    let group = join_group_in_db(&pool, user.id, group_id).await?;
    Ok(Json(GroupWrapper {
        group: group.into(),
    }))
}

pub async fn leave_group(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(group_id): Path<i64>,
) -> EmptyResult {
    leave_group_in_db(&pool, user.id, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_group_member(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> JsonResult<GroupJson> {
    let group = add_group_member_in_db(&pool, user.id, group_id, user_id).await?;
    Ok(Json(GroupWrapper {
        group: group.into(),
    }))
}

pub async fn create_group_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(group_id): Path<i64>,
    Json(PostWrapper { post: request }): Json<PostWrapper<PostRequest>>,
) -> JsonResult<PostWrapper<GroupPostResponse>> {
    request.validate()?;
    let post = create_group_post_in_db(&pool, user.id, group_id, request).await?;
    Ok(Json(PostWrapper {
        post: GroupPostResponse::new(post, vec![]),
    }))
}

pub async fn delete_group_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> EmptyResult {
    delete_group_post_in_db(&pool, user.id, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn comment_group_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
    Json(CommentWrapper { comment: request }): Json<CommentWrapper<CommentRequest>>,
) -> JsonResult<CommentWrapper<CommentResponse>> {
    let comment = comment_group_post_in_db(&pool, user.id, post_id, &request.content).await?;
    Ok(Json(CommentWrapper {
        comment: comment.into(),
    }))
}
