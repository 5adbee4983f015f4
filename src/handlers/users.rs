use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::{
    authentication::{get_jwt_token, hash_password_argon2, verify_password_argon2, AuthUser},
    config::AuthConfig,
    data_formats::{
        LoginRequest, MultipleUsersWrapper, ProfileResponse, ProfileViewResponse, ProfileWrapper,
        RegisterRequest, SearchParams, UpdateProfileRequest, UpdateUserRequest, UserResponse,
        UserWrapper,
    },
    db_helpers::{
        get_own_profile_in_db, get_profile_view_in_db, get_user_by_id, get_user_by_username,
        insert_user, list_users_in_db, update_profile_in_db, update_user_in_db,
    },
    errors::RequestError,
};

use super::JsonResult;

type UserJson = UserWrapper<UserResponse>;

fn issue_token(auth: &AuthConfig, user_id: i64) -> Result<String, RequestError> {
    get_jwt_token(auth, user_id).map_err(|e| {
        tracing::error!(error = %e, user_id, "could not issue token");
        RequestError::ServerError
    })
}

// ----------------- User Handlers -----------------
pub async fn register_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(auth): Extension<Arc<AuthConfig>>,
    Json(UserWrapper { user: request }): Json<UserWrapper<RegisterRequest>>,
) -> JsonResult<UserJson> {
    request.validate()?;
    let password_hash = hash_password_argon2(request.password).await.map_err(|e| {
        tracing::error!(error = %e, "could not hash password");
        RequestError::ServerError
    })?;
    let user = insert_user(
        &pool,
        request.username.trim(),
        request.email.trim(),
        &password_hash,
    )
    .await?;
    let token = issue_token(&auth, user.id)?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse::new(
        user, token,
    ))))
}

pub async fn login_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(auth): Extension<Arc<AuthConfig>>,
    Json(UserWrapper { user: request }): Json<UserWrapper<LoginRequest>>,
) -> JsonResult<UserJson> {
    let user = match get_user_by_username(&pool, request.username.trim()).await? {
        Some(user) => user,
        None => return Err(RequestError::NotAuthorized("Invalid username or password")),
    };
    let is_password_correct = verify_password_argon2(request.password, user.password.clone())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "could not verify password");
            RequestError::ServerError
        })?;
    if !is_password_correct {
        tracing::debug!(username = %user.username, "failed login");
        return Err(RequestError::NotAuthorized("Invalid username or password"));
    }
    let token = issue_token(&auth, user.id)?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse::new(
        user, token,
    ))))
}

pub async fn get_current_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    AuthUser { id, token }: AuthUser,
) -> JsonResult<UserJson> {
    let user = get_user_by_id(&pool, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse::new(
        user, token,
    ))))
}

pub async fn update_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    AuthUser { id, token }: AuthUser,
    Json(UserWrapper { user: request }): Json<UserWrapper<UpdateUserRequest>>,
) -> JsonResult<UserJson> {
    request.validate()?;
    let password_hash = match request.password {
        Some(password) => Some(hash_password_argon2(password).await.map_err(|e| {
            tracing::error!(error = %e, "could not hash password");
            RequestError::ServerError
        })?),
        None => None,
    };
    let email = request.email.map(|email| email.trim().to_string());
    let user = update_user_in_db(&pool, id, email, password_hash).await?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse::new(
        user, token,
    ))))
}

pub async fn list_users(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Query(params): Query<SearchParams>,
) -> JsonResult<MultipleUsersWrapper> {
    let users = list_users_in_db(&pool, user.id, params.search.as_deref()).await?;
    Ok(Json(MultipleUsersWrapper { users }))
}
// ----------------- End User Handlers -----------------

// ----------------- Profile Handlers -----------------
pub async fn get_my_profile(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
) -> JsonResult<ProfileWrapper<ProfileResponse>> {
    let profile = get_own_profile_in_db(&pool, user.id).await?;
    Ok(Json(ProfileWrapper {
        profile: profile.into(),
    }))
}

pub async fn update_my_profile(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Json(ProfileWrapper { profile: request }): Json<ProfileWrapper<UpdateProfileRequest>>,
) -> JsonResult<ProfileWrapper<ProfileResponse>> {
    request.validate()?;
    let profile = update_profile_in_db(&pool, user.id, request).await?;
    Ok(Json(ProfileWrapper {
        profile: profile.into(),
    }))
}

pub async fn get_profile(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(username): Path<String>,
) -> JsonResult<ProfileWrapper<ProfileViewResponse>> {
    let view = get_profile_view_in_db(&pool, user.id, &username).await?;
    Ok(Json(ProfileWrapper {
        profile: view.into(),
    }))
}
