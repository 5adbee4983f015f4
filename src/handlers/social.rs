use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, Extension, Json};
use sqlx::SqlitePool;

use crate::{
    authentication::AuthUser,
    data_formats::{
        FollowWrapper, FollowersWrapper, FollowingWrapper, FriendRequestsWrapper,
        FriendsWrapper, FriendshipWrapper,
    },
    db_helpers::{
        accept_friend_request_in_db, follow_user_in_db, list_followers_in_db,
        list_following_in_db, list_friend_requests_in_db, list_friends_in_db,
        reject_friend_request_in_db, remove_friend_in_db, send_friend_request_in_db,
        unfollow_user_in_db,
    },
};

use super::{EmptyResult, JsonResult};

// ----------------- Friendship Handlers -----------------
pub async fn list_friends(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
) -> JsonResult<FriendsWrapper> {
    let friends = list_friends_in_db(&pool, user.id).await?;
    Ok(Json(FriendsWrapper { friends }))
}

pub async fn send_friend_request(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> JsonResult<FriendshipWrapper> {
    let (friendship, outcome) = send_friend_request_in_db(&pool, user.id, user_id).await?;
    Ok(Json(FriendshipWrapper {
        friendship: friendship.into(),
        outcome: Some(outcome),
    }))
}

pub async fn remove_friend(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> EmptyResult {
    remove_friend_in_db(&pool, user.id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_friend_requests(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
) -> JsonResult<FriendRequestsWrapper> {
    let (incoming, outgoing) = list_friend_requests_in_db(&pool, user.id).await?;
    Ok(Json(FriendRequestsWrapper {
        incoming: incoming.into_iter().map(Into::into).collect(),
        outgoing: outgoing.into_iter().map(Into::into).collect(),
    }))
}

pub async fn accept_friend_request(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(friendship_id): Path<i64>,
) -> JsonResult<FriendshipWrapper> {
    let friendship = accept_friend_request_in_db(&pool, user.id, friendship_id).await?;
    Ok(Json(FriendshipWrapper {
        friendship: friendship.into(),
        outcome: None,
    }))
}

pub async fn reject_friend_request(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(friendship_id): Path<i64>,
) -> JsonResult<FriendshipWrapper> {
    let friendship = reject_friend_request_in_db(&pool, user.id, friendship_id).await?;
    Ok(Json(FriendshipWrapper {
        friendship: friendship.into(),
        outcome: None,
    }))
}

// ----------------- Follow Handlers -----------------
pub async fn follow_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> JsonResult<FollowWrapper> {
    let changed = follow_user_in_db(&pool, user.id, user_id).await?;
    Ok(Json(FollowWrapper {
        user_id,
        following: true,
        changed,
    }))
}

pub async fn unfollow_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> JsonResult<FollowWrapper> {
    let changed = unfollow_user_in_db(&pool, user.id, user_id).await?;
    Ok(Json(FollowWrapper {
        user_id,
        following: false,
        changed,
    }))
}

pub async fn list_followers(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
) -> JsonResult<FollowersWrapper> {
    let followers = list_followers_in_db(&pool, user.id).await?;
    Ok(Json(FollowersWrapper { followers }))
}

pub async fn list_following(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
) -> JsonResult<FollowingWrapper> {
    let following = list_following_in_db(&pool, user.id).await?;
    Ok(Json(FollowingWrapper { following }))
}
