use chrono::NaiveDate;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::{
    errors::RequestError,
    models::User,
};

mod conversation_helpers;
mod follow_helpers;
mod friendship_helpers;
mod group_helpers;
mod news_helpers;
mod notification_helpers;
mod post_helpers;
mod profile_helpers;
mod review_helpers;
mod user_helpers;

pub use conversation_helpers::*;
pub use follow_helpers::*;
pub use friendship_helpers::*;
pub use group_helpers::*;
pub use news_helpers::*;
pub use notification_helpers::*;
pub use post_helpers::*;
pub use profile_helpers::*;
pub use review_helpers::*;
pub use user_helpers::*;

const NOW: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

pub(crate) enum SqlParam {
    Text(String),
    Integer(i64),
    Date(NaiveDate),
    Null,
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Integer(value as i64)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(value: NaiveDate) -> Self {
        SqlParam::Date(value)
    }
}

/// Builds `UPDATE <table> SET a = $1, b = $2 WHERE <key> = $n` from the
/// columns that were actually supplied.
pub(crate) struct QueryBuilder {
    query: String,
    params: Vec<SqlParam>,
    seperator: &'static str,
    counter: usize,
}

impl QueryBuilder {
    pub(crate) fn update(table: &str) -> Self {
        Self {
            query: format!("UPDATE {table} SET "),
            params: vec![],
            seperator: ", ",
            counter: 0,
        }
    }

    pub(crate) fn add_param<T: Into<SqlParam>>(mut self, column: &str, param: Option<T>) -> Self {
        if let Some(value) = param {
            self.params.push(value.into());
            let filter = format!("{} = ${}{}", column, self.params.len(), self.seperator);
            self.query.push_str(&filter);
            self.counter += 1;
        }
        self
    }

    /// An empty string clears a nullable column.
    pub(crate) fn add_nullable(mut self, column: &str, param: Option<String>) -> Self {
        if let Some(value) = param {
            let value = if value.trim().is_empty() {
                SqlParam::Null
            } else {
                SqlParam::Text(value)
            };
            self.params.push(value);
            let filter = format!("{} = ${}{}", column, self.params.len(), self.seperator);
            self.query.push_str(&filter);
            self.counter += 1;
        }
        self
    }

    pub(crate) fn touch(mut self, column: &str) -> Self {
        if self.counter > 0 {
            self.query
                .push_str(&format!("{} = {}{}", column, NOW, self.seperator));
        }
        self
    }

    /// `None` when no column was supplied.
    pub(crate) fn build(mut self, key_column: &str, key: i64) -> Option<(String, Vec<SqlParam>)> {
        if self.counter == 0 {
            return None;
        }
        self.query = self.query.trim_end_matches(self.seperator).to_string();
        self.params.push(SqlParam::Integer(key));
        self.query
            .push_str(&format!(" WHERE {} = ${}", key_column, self.params.len()));
        Some((self.query, self.params))
    }

    pub(crate) async fn execute(
        self,
        conn: &mut SqliteConnection,
        key_column: &str,
        key: i64,
    ) -> Result<u64, sqlx::Error> {
        let (query, params) = match self.build(key_column, key) {
            Some(built) => built,
            None => return Ok(0),
        };
        let mut statement = sqlx::query::<Sqlite>(&query);
        for param in params {
            statement = match param {
                SqlParam::Text(value) => statement.bind(value),
                SqlParam::Integer(value) => statement.bind(value),
                SqlParam::Date(value) => statement.bind(value),
                SqlParam::Null => statement.bind(Option::<String>::None),
            };
        }
        Ok(statement.execute(&mut *conn).await?.rows_affected())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// ----------------- Helper Functions -----------------

pub(crate) const USER_COLUMNS: &str =
    "id, username, email, password, is_superuser, created_at";

/// Transaction for helpers that write. It takes the write lock with its
/// first statement, the way `BEGIN IMMEDIATE` would, so concurrent writers
/// wait on the busy timeout. A deferred transaction that reads first gets
/// `SQLITE_BUSY` straight away when it later tries to write.
pub(crate) async fn begin_write(
    pool: &SqlitePool,
) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    // No-op write: no row matches, but the statement still opens the write lock.
    sqlx::query("UPDATE users SET id = id WHERE 0")
        .execute(&mut tx)
        .await?;
    Ok(tx)
}

pub(crate) async fn fetch_user_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<Sqlite, User>(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub(crate) async fn fetch_user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
    sqlx::query_as::<Sqlite, User>(&query)
        .bind(username)
        .fetch_optional(&mut *conn)
        .await
}

pub(crate) async fn require_user(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<User, RequestError> {
    fetch_user_by_id(conn, id)
        .await?
        .ok_or(RequestError::NotFound("User not found"))
}

pub(crate) async fn require_user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<User, RequestError> {
    fetch_user_by_username(conn, username)
        .await?
        .ok_or(RequestError::NotFound("User not found"))
}

pub(crate) async fn are_friends(
    conn: &mut SqliteConnection,
    a: i64,
    b: i64,
) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM friendships
            WHERE status = 'accepted'
              AND ((from_user_id = $1 AND to_user_id = $2)
                OR (from_user_id = $2 AND to_user_id = $1))
        )
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

pub(crate) async fn is_following(
    conn: &mut SqliteConnection,
    follower_id: i64,
    following_id: i64,
) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

fn like_pattern(search: &str) -> String {
    let escaped = search
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::SqlitePool;
    use std::str::FromStr;

    /// Single-connection in-memory pool with migrations applied.
    pub async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    /// File-backed pool opened the way the server opens it, with several
    /// connections. Keep the directory alive for as long as the pool.
    pub async fn file_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("socialnet.db").display());
        let pool = crate::init_db(&url).await.unwrap();
        (dir, pool)
    }

    pub async fn create_user(pool: &SqlitePool, username: &str) -> i64 {
        super::insert_user(pool, username, &format!("{username}@example.com"), "not-a-hash")
            .await
            .unwrap()
            .id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_builder_skips_missing_columns() {
        let (query, params) = QueryBuilder::update("profiles")
            .add_param("bio", Some("hi".to_string()))
            .add_param::<String>("location", None)
            .add_nullable("avatar", Some(String::new()))
            .build("user_id", 3)
            .unwrap();
        assert_eq!(
            query,
            "UPDATE profiles SET bio = $1, avatar = $2 WHERE user_id = $3"
        );
        assert_eq!(params.len(), 3);
        assert!(matches!(params[1], SqlParam::Null));
    }

    #[test]
    fn update_builder_without_columns_builds_nothing() {
        assert!(QueryBuilder::update("news")
            .add_param::<bool>("is_pinned", None)
            .touch("updated_at")
            .build("id", 1)
            .is_none());
    }

    #[test]
    fn pagination_is_clamped() {
        let page = Pagination::new(Some(1000), Some(-5));
        assert_eq!(page.limit, Pagination::MAX_LIMIT);
        assert_eq!(page.offset, 0);
        assert_eq!(Pagination::default().limit, Pagination::DEFAULT_LIMIT);
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        let (rows,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap();
        rows
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn duplicate_submissions_resolve_under_concurrency() {
        let (_dir, pool) = test_support::file_pool().await;
        let alice = test_support::create_user(&pool, "alice").await;
        let bob = test_support::create_user(&pool, "bob").await;

        for _ in 0..10 {
            let (first, second) = tokio::join!(
                leave_review_in_db(&pool, alice, "bob", 3, ""),
                leave_review_in_db(&pool, alice, "bob", 4, ""),
            );
            assert!(first.is_ok() && second.is_ok());
        }
        assert_eq!(count(&pool, "reviews").await, 1);

        let (first, second) = tokio::join!(
            follow_user_in_db(&pool, alice, bob),
            follow_user_in_db(&pool, alice, bob),
        );
        // exactly one of the two created the edge
        assert!(first.unwrap() ^ second.unwrap());
        assert_eq!(count(&pool, "follows").await, 1);

        let (first, second) = tokio::join!(
            send_friend_request_in_db(&pool, alice, bob),
            send_friend_request_in_db(&pool, bob, alice),
        );
        let (friendship, _) = first.unwrap();
        second.unwrap();
        assert_eq!(count(&pool, "friendships").await, 1);
        let mut conn = pool.acquire().await.unwrap();
        let row = friendship_helpers::fetch_friendship_between(&mut conn, alice, bob)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.id, friendship.id);
        assert_eq!(row.status, crate::models::FriendshipStatus::Accepted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unrelated_writes_do_not_fail_each_other() {
        let (_dir, pool) = test_support::file_pool().await;
        let mut users = Vec::new();
        for name in ["alice", "bob", "carol", "dave"] {
            users.push(test_support::create_user(&pool, name).await);
        }
        let (a, b, c, d) = (users[0], users[1], users[2], users[3]);

        for _ in 0..10 {
            let (first, second) = tokio::join!(
                follow_user_in_db(&pool, a, b),
                follow_user_in_db(&pool, c, d),
            );
            first.unwrap();
            second.unwrap();
            let (first, second) = tokio::join!(
                unfollow_user_in_db(&pool, a, b),
                unfollow_user_in_db(&pool, c, d),
            );
            first.unwrap();
            second.unwrap();
        }
        assert_eq!(count(&pool, "follows").await, 0);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" a_b% "), "%a\\_b\\%%");
    }
}
