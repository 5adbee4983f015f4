use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    data_formats::UpdateProfileRequest,
    errors::RequestError,
    models::{FriendshipStatus, Profile, ProfileStats, ProfileView, Relation},
};

use super::{
    begin_write, friendship_helpers::fetch_friendship_between, is_following,
    require_user_by_username, QueryBuilder,
};

async fn fetch_profile(conn: &mut SqliteConnection, user_id: i64) -> Result<Profile, RequestError> {
    let profile = sqlx::query_as::<Sqlite, Profile>(
        r#"
        SELECT profiles.user_id, users.username, profiles.bio, profiles.avatar,
               profiles.birth_date, profiles.location, profiles.website, profiles.phone,
               users.created_at
        FROM profiles
        JOIN users ON users.id = profiles.user_id
        WHERE profiles.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    profile.ok_or(RequestError::NotFound("Profile not found"))
}

async fn fetch_profile_stats(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<ProfileStats, sqlx::Error> {
    sqlx::query_as::<Sqlite, ProfileStats>(
        r#"
        SELECT (SELECT COUNT(*) FROM follows WHERE following_id = $1) AS followers_count,
               (SELECT COUNT(*) FROM follows WHERE follower_id = $1)  AS following_count,
               (SELECT COUNT(*) FROM friendships
                 WHERE status = 'accepted'
                   AND (from_user_id = $1 OR to_user_id = $1))        AS friends_count,
               (SELECT COUNT(*) FROM reviews WHERE reviewed_user_id = $1) AS reviews_count,
               (SELECT AVG(rating) FROM reviews WHERE reviewed_user_id = $1) AS average_rating
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn get_own_profile_in_db(pool: &SqlitePool, user_id: i64) -> Result<Profile, RequestError> {
    let mut tx = pool.begin().await?;
    let profile = fetch_profile(&mut tx, user_id).await?;
    tx.commit().await?;
    Ok(profile)
}

pub async fn update_profile_in_db(
    pool: &SqlitePool,
    user_id: i64,
    UpdateProfileRequest {
        bio,
        avatar,
        birth_date,
        location,
        website,
        phone,
    }: UpdateProfileRequest,
) -> Result<Profile, RequestError> {
    let mut tx = begin_write(pool).await?;
    // Make sure the row exists before updating it.
    fetch_profile(&mut tx, user_id).await?;
    QueryBuilder::update("profiles")
        .add_param("bio", bio)
        .add_nullable("avatar", avatar)
        .add_param("birth_date", birth_date)
        .add_param("location", location)
        .add_param("website", website)
        .add_param("phone", phone)
        .execute(&mut tx, "user_id", user_id)
        .await?;
    let profile = fetch_profile(&mut tx, user_id).await?;
    tx.commit().await?;
    Ok(profile)
}

pub async fn get_profile_view_in_db(
    pool: &SqlitePool,
    viewer_id: i64,
    username: &str,
) -> Result<ProfileView, RequestError> {
    let mut tx = pool.begin().await?;
    let user = require_user_by_username(&mut tx, username).await?;
    let profile = fetch_profile(&mut tx, user.id).await?;

    let (relation, friendship_id) = if user.id == viewer_id {
        (Relation::Myself, None)
    } else {
        match fetch_friendship_between(&mut tx, viewer_id, user.id).await? {
            Some(f) if f.status == FriendshipStatus::Accepted => (Relation::Friends, Some(f.id)),
            Some(f) if f.status == FriendshipStatus::Pending && f.from_user_id == viewer_id => {
                (Relation::RequestSent, Some(f.id))
            }
            Some(f) if f.status == FriendshipStatus::Pending => {
                (Relation::RequestReceived, Some(f.id))
            }
            _ => (Relation::None, None),
        }
    };
    let following = is_following(&mut tx, viewer_id, user.id).await?;
    let followed_by = is_following(&mut tx, user.id, viewer_id).await?;
    let stats = fetch_profile_stats(&mut tx, user.id).await?;
    tx.commit().await?;

    Ok(ProfileView {
        profile,
        relation,
        friendship_id,
        following,
        followed_by,
        stats,
    })
}
