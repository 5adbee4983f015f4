mod authentication;
pub mod config;
mod data_formats;
mod db_helpers;
mod errors;
mod handlers;
mod models;
pub mod telemetry;

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
use config::{AppConfig, AuthConfig};
pub use data_formats::*;
pub use db_helpers::promote_superusers;
pub use errors::{RequestErrorJson, RequestErrorJsonWrapper};
use handlers::*;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Sqlite, SqlitePool,
};
use std::{net::TcpListener, str::FromStr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;

pub type JsonResponse<T> = (StatusCode, Json<T>);

/// Opens the database, creating it first if needed, and applies migrations.
pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        tracing::info!(%db_url, "creating database");
        Sqlite::create_database(db_url)
            .await
            .with_context(|| format!("Failed to create database {db_url}"))?;
    } else {
        tracing::debug!(%db_url, "database already exists");
    }
    // WAL lets reads proceed during a write; writers queue on the busy timeout.
    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("Invalid database url {db_url}"))?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .context("Failed to connect to the database")?;
    tracing::info!("running migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

pub fn make_router() -> Router {
    Router::new()
        .route("/check_health", get(alive))
        // accounts and profiles
        .route("/users/login", post(login_user))
        .route("/users", post(register_user).get(list_users))
        .route("/user", get(get_current_user).put(update_user))
        .route("/user/profile", get(get_my_profile).put(update_my_profile))
        .route("/profiles/:username", get(get_profile))
        .route(
            "/profiles/:username/reviews",
            get(list_reviews).post(leave_review),
        )
        .route("/reviews/:review_id", delete(delete_review))
        // friendships and follows
        .route("/friends", get(list_friends))
        .route(
            "/friends/:user_id",
            post(send_friend_request).delete(remove_friend),
        )
        .route("/friend-requests", get(list_friend_requests))
        .route(
            "/friend-requests/:friendship_id/accept",
            post(accept_friend_request),
        )
        .route(
            "/friend-requests/:friendship_id/reject",
            post(reject_friend_request),
        )
        .route("/follows/:user_id", post(follow_user).delete(unfollow_user))
        .route("/followers", get(list_followers))
        .route("/following", get(list_following))
        // messaging
        .route(
            "/conversations",
            get(list_conversations).post(start_conversation),
        )
        .route("/conversations/:conversation_id", get(view_conversation))
        .route(
            "/conversations/:conversation_id/messages",
            post(send_message),
        )
        // groups
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/:group_id",
            get(get_group).put(update_group).delete(delete_group),
        )
        .route("/groups/:group_id/join", post(join_group))
        .route("/groups/:group_id/leave", post(leave_group))
        .route("/groups/:group_id/members/:user_id", post(add_group_member))
        .route("/groups/:group_id/posts", post(create_group_post))
        .route("/group-posts/:post_id", delete(delete_group_post))
        .route("/group-posts/:post_id/comments", post(comment_group_post))
        // feed
        .route("/feed", get(get_feed))
        .route("/posts", post(create_post))
        .route("/posts/:post_id", get(get_post).delete(delete_post))
        .route("/posts/:post_id/like", post(toggle_like))
        .route("/posts/:post_id/comments", post(comment_post))
        .route("/post-comments/:comment_id", delete(delete_post_comment))
        // notifications
        .route(
            "/notifications",
            get(list_notifications).put(mark_all_notifications_read),
        )
        .route(
            "/notifications/:notification_id",
            put(mark_notification_read).delete(delete_notification),
        )
        // news
        .route("/news", get(list_news).post(create_news))
        .route(
            "/news/:news_id",
            get(get_news).put(update_news).delete(delete_news),
        )
        .fallback(not_found)
}

/// The full application: routes plus the shared pool, auth settings and
/// request tracing.
pub fn build_app(pool: SqlitePool, auth: AuthConfig) -> Router {
    make_router()
        .layer(Extension(Arc::new(pool)))
        .layer(Extension(Arc::new(auth)))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    let address = listener.local_addr()?;
    tracing::info!(%address, "listening");
    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let pool = init_db(&config.database_url).await?;
    if !config.superusers.is_empty() {
        let promoted = promote_superusers(&pool, &config.superusers)
            .await
            .context("Failed to promote superusers")?;
        tracing::info!(promoted, "superusers promoted");
    }
    let listener = TcpListener::bind(config.address)
        .with_context(|| format!("Failed to bind {}", config.address))?;
    serve(listener, build_app(pool, config.auth)).await
}
