use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, Extension, Json};
use sqlx::SqlitePool;

use crate::{
    authentication::AuthUser,
    data_formats::{NewsRequest, NewsResponse, NewsWrapper, UpdateNewsRequest},
    db_helpers::{
        create_news_in_db, delete_news_in_db, get_news_in_db, list_news_in_db, update_news_in_db,
    },
};

use super::{EmptyResult, JsonResult};

type NewsJson = NewsWrapper<NewsResponse>;

pub async fn list_news(
    Extension(pool): Extension<Arc<SqlitePool>>,
    _user: AuthUser,
) -> JsonResult<NewsWrapper<Vec<NewsResponse>>> {
    let news = list_news_in_db(&pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(NewsWrapper { news }))
}

pub async fn get_news(
    Extension(pool): Extension<Arc<SqlitePool>>,
    _user: AuthUser,
    Path(news_id): Path<i64>,
) -> JsonResult<NewsJson> {
    let news = get_news_in_db(&pool, news_id).await?;
    Ok(Json(NewsWrapper { news: news.into() }))
}

pub async fn create_news(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Json(NewsWrapper { news: request }): Json<NewsWrapper<NewsRequest>>,
) -> JsonResult<NewsJson> {
    request.validate()?;
    let news = create_news_in_db(&pool, user.id, request).await?;
    Ok(Json(NewsWrapper { news: news.into() }))
}

pub async fn update_news(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(news_id): Path<i64>,
    Json(NewsWrapper { news: request }): Json<NewsWrapper<UpdateNewsRequest>>,
) -> JsonResult<NewsJson> {
    request.validate()?;
    let news = update_news_in_db(&pool, user.id, news_id, request).await?;
    Ok(Json(NewsWrapper { news: news.into() }))
}

pub async fn delete_news(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(news_id): Path<i64>,
) -> EmptyResult {
    delete_news_in_db(&pool, user.id, news_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
