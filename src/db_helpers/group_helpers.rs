use std::collections::HashMap;

use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    data_formats::{CreateGroupRequest, PostRequest, UpdateGroupRequest},
    errors::RequestError,
    models::{Comment, Group, GroupDetail, GroupMember, GroupPost, GroupRole},
};

use super::{
    begin_write, like_pattern,
    notification_helpers::{notify_group_post, notify_new_comment},
    require_user, QueryBuilder,
};

const GROUP_QUERY: &str = r#"
        SELECT social_groups.id, social_groups.name, social_groups.description,
               social_groups.avatar, social_groups.creator_id, social_groups.is_private,
               social_groups.created_at, social_groups.updated_at,
               (SELECT COUNT(*) FROM group_memberships m
                 WHERE m.group_id = social_groups.id)                  AS members_count,
               (SELECT m.role FROM group_memberships m
                 WHERE m.group_id = social_groups.id AND m.user_id = $1) AS viewer_role
        FROM social_groups
"#;

const GROUP_POST_QUERY: &str = r#"
        SELECT group_posts.id, group_posts.group_id, group_posts.author_id,
               users.username AS author_username, group_posts.content, group_posts.image,
               group_posts.created_at, group_posts.updated_at
        FROM group_posts
        JOIN users ON users.id = group_posts.author_id
"#;

const GROUP_COMMENT_QUERY: &str = r#"
        SELECT group_post_comments.id, group_post_comments.post_id,
               group_post_comments.author_id, users.username AS author_username,
               group_post_comments.content, group_post_comments.created_at
        FROM group_post_comments
        JOIN users ON users.id = group_post_comments.author_id
"#;

async fn fetch_group(
    conn: &mut SqliteConnection,
    viewer_id: i64,
    group_id: i64,
) -> Result<Group, RequestError> {
    let query = format!("{GROUP_QUERY} WHERE social_groups.id = $2");
    sqlx::query_as::<Sqlite, Group>(&query)
        .bind(viewer_id)
        .bind(group_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RequestError::NotFound("Group not found"))
}

fn require_member(group: &Group) -> Result<GroupRole, RequestError> {
    group
        .viewer_role
        .ok_or(RequestError::Forbidden("You are not a member of this group"))
}

fn require_admin(group: &Group) -> Result<(), RequestError> {
    match group.viewer_role {
        Some(GroupRole::Admin) => Ok(()),
        _ => Err(RequestError::Forbidden("Only group admins can do this")),
    }
}

async fn fetch_group_post(
    conn: &mut SqliteConnection,
    post_id: i64,
) -> Result<GroupPost, RequestError> {
    let query = format!("{GROUP_POST_QUERY} WHERE group_posts.id = $1");
    sqlx::query_as::<Sqlite, GroupPost>(&query)
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RequestError::NotFound("Post not found"))
}

async fn insert_membership(
    conn: &mut SqliteConnection,
    group_id: i64,
    user_id: i64,
    role: GroupRole,
) -> Result<(), RequestError> {
    sqlx::query("INSERT INTO group_memberships (user_id, group_id, role) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(group_id)
        .bind(role)
        .execute(&mut *conn)
        .await
        .map_err(|e| RequestError::from(e).on_conflict("Already a member of this group"))?;
    Ok(())
}

pub async fn list_groups_in_db(
    pool: &SqlitePool,
    viewer_id: i64,
    search: Option<&str>,
) -> Result<Vec<Group>, RequestError> {
    let mut tx = pool.begin().await?;
    let pattern = search.filter(|s| !s.trim().is_empty()).map(like_pattern);
    let query = format!(
        r#"{GROUP_QUERY}
        WHERE $2 IS NULL OR social_groups.name LIKE $2 ESCAPE '\'
        ORDER BY social_groups.created_at DESC, social_groups.id DESC"#
    );
    let groups = sqlx::query_as::<Sqlite, Group>(&query)
        .bind(viewer_id)
        .bind(pattern)
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(groups)
}

/// The creator joins as the group's first admin.
pub async fn create_group_in_db(
    pool: &SqlitePool,
    creator_id: i64,
    CreateGroupRequest {
        name,
        description,
        avatar,
        is_private,
    }: CreateGroupRequest,
) -> Result<Group, RequestError> {
    let mut tx = begin_write(pool).await?;
    let (group_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO social_groups (name, description, avatar, creator_id, is_private)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(name.trim())
    .bind(description)
    .bind(avatar.filter(|a| !a.trim().is_empty()))
    .bind(creator_id)
    .bind(is_private)
    .fetch_one(&mut tx)
    .await?;
    insert_membership(&mut tx, group_id, creator_id, GroupRole::Admin).await?;
    let group = fetch_group(&mut tx, creator_id, group_id).await?;
    tx.commit().await?;
    tracing::info!(group_id, creator_id, "created group");
    Ok(group)
}

/// Members and posts of a private group are only shown to its members.
pub async fn get_group_detail_in_db(
    pool: &SqlitePool,
    viewer_id: i64,
    group_id: i64,
) -> Result<GroupDetail, RequestError> {
    let mut tx = pool.begin().await?;
    let group = fetch_group(&mut tx, viewer_id, group_id).await?;
    if group.is_private && group.viewer_role.is_none() {
        tx.commit().await?;
        return Ok(GroupDetail {
            group,
            members: vec![],
            posts: vec![],
        });
    }

    let members = sqlx::query_as::<Sqlite, GroupMember>(
        r#"
        SELECT users.id AS user_id, users.username, group_memberships.role,
               group_memberships.joined_at
        FROM group_memberships
        JOIN users ON users.id = group_memberships.user_id
        WHERE group_memberships.group_id = $1
        ORDER BY group_memberships.joined_at DESC, group_memberships.id DESC
        "#,
    )
    .bind(group_id)
    .fetch_all(&mut tx)
    .await?;

    let query = format!(
        "{GROUP_POST_QUERY} WHERE group_posts.group_id = $1 ORDER BY group_posts.created_at DESC, group_posts.id DESC"
    );
    let posts = sqlx::query_as::<Sqlite, GroupPost>(&query)
        .bind(group_id)
        .fetch_all(&mut tx)
        .await?;

    let query = format!(
        r#"{GROUP_COMMENT_QUERY}
        JOIN group_posts ON group_posts.id = group_post_comments.post_id
        WHERE group_posts.group_id = $1
        ORDER BY group_post_comments.created_at, group_post_comments.id"#
    );
    let comments = sqlx::query_as::<Sqlite, Comment>(&query)
        .bind(group_id)
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;

    let mut by_post: HashMap<i64, Vec<Comment>> = HashMap::new();
    for comment in comments {
        by_post.entry(comment.post_id).or_default().push(comment);
    }
    let posts = posts
        .into_iter()
        .map(|post| {
            let comments = by_post.remove(&post.id).unwrap_or_default();
            (post, comments)
        })
        .collect();

    Ok(GroupDetail {
        group,
        members,
        posts,
    })
}

pub async fn update_group_in_db(
    pool: &SqlitePool,
    user_id: i64,
    group_id: i64,
    UpdateGroupRequest {
        name,
        description,
        avatar,
        is_private,
    }: UpdateGroupRequest,
) -> Result<Group, RequestError> {
    let mut tx = begin_write(pool).await?;
    let group = fetch_group(&mut tx, user_id, group_id).await?;
    require_admin(&group)?;
    QueryBuilder::update("social_groups")
        .add_param("name", name.map(|n| n.trim().to_string()))
        .add_param("description", description)
        .add_nullable("avatar", avatar)
        .add_param("is_private", is_private)
        .touch("updated_at")
        .execute(&mut tx, "id", group_id)
        .await?;
    let group = fetch_group(&mut tx, user_id, group_id).await?;
    tx.commit().await?;
    Ok(group)
}

pub async fn join_group_in_db(
    pool: &SqlitePool,
    user_id: i64,
    group_id: i64,
) -> Result<Group, RequestError> {
    let mut tx = begin_write(pool).await?;
    let group = fetch_group(&mut tx, user_id, group_id).await?;
    if group.viewer_role.is_some() {
        return Err(RequestError::RunTimeError("Already a member of this group"));
    }
    if group.is_private {
        return Err(RequestError::Forbidden(
            "This group is private; ask an admin to add you",
        ));
    }
    insert_membership(&mut tx, group_id, user_id, GroupRole::Member).await?;
    let group = fetch_group(&mut tx, user_id, group_id).await?;
    tx.commit().await?;
    Ok(group)
}

/// Admins add members directly; the only way into a private group.
pub async fn add_group_member_in_db(
    pool: &SqlitePool,
    admin_id: i64,
    group_id: i64,
    user_id: i64,
) -> Result<Group, RequestError> {
    let mut tx = begin_write(pool).await?;
    let group = fetch_group(&mut tx, admin_id, group_id).await?;
    require_admin(&group)?;
    require_user(&mut tx, user_id).await?;
    insert_membership(&mut tx, group_id, user_id, GroupRole::Member).await?;
    let group = fetch_group(&mut tx, admin_id, group_id).await?;
    tx.commit().await?;
    Ok(group)
}

pub async fn leave_group_in_db(
    pool: &SqlitePool,
    user_id: i64,
    group_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    let group = fetch_group(&mut tx, user_id, group_id).await?;
    require_member(&group)?;
    if group.creator_id == user_id {
        return Err(RequestError::RunTimeError(
            "The creator cannot leave the group; delete it instead",
        ));
    }
    sqlx::query("DELETE FROM group_memberships WHERE group_id = $1 AND user_id = $2")
        .bind(group_id)
        .bind(user_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Creator only. Memberships, posts and comments go with it.
pub async fn delete_group_in_db(
    pool: &SqlitePool,
    user_id: i64,
    group_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    let group = fetch_group(&mut tx, user_id, group_id).await?;
    if group.creator_id != user_id {
        return Err(RequestError::Forbidden(
            "Only the creator can delete this group",
        ));
    }
    sqlx::query("DELETE FROM social_groups WHERE id = $1")
        .bind(group_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    tracing::info!(group_id, "deleted group");
    Ok(())
}

pub async fn create_group_post_in_db(
    pool: &SqlitePool,
    user_id: i64,
    group_id: i64,
    PostRequest { content, image }: PostRequest,
) -> Result<GroupPost, RequestError> {
    let mut tx = begin_write(pool).await?;
    let group = fetch_group(&mut tx, user_id, group_id).await?;
    require_member(&group)?;
    let author = require_user(&mut tx, user_id).await?;

    let (post_id,): (i64,) = sqlx::query_as(
        "INSERT INTO group_posts (group_id, author_id, content, image) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(group_id)
    .bind(user_id)
    .bind(content.trim())
    .bind(image.filter(|i| !i.trim().is_empty()))
    .fetch_one(&mut tx)
    .await?;
    notify_group_post(&mut tx, group_id, &group.name, user_id, &author.username).await?;
    let post = fetch_group_post(&mut tx, post_id).await?;
    tx.commit().await?;
    Ok(post)
}

pub async fn comment_group_post_in_db(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
    content: &str,
) -> Result<Comment, RequestError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(RequestError::RunTimeError("Comment cannot be empty"));
    }
    let mut tx = begin_write(pool).await?;
    let post = fetch_group_post(&mut tx, post_id).await?;
    let group = fetch_group(&mut tx, user_id, post.group_id).await?;
    require_member(&group)?;
    let author = require_user(&mut tx, user_id).await?;

    let (comment_id,): (i64,) = sqlx::query_as(
        "INSERT INTO group_post_comments (post_id, author_id, content) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(post_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(&mut tx)
    .await?;
    notify_new_comment(
        &mut tx,
        post.author_id,
        user_id,
        &author.username,
        format!("/groups/{}", post.group_id),
    )
    .await?;
    let query = format!("{GROUP_COMMENT_QUERY} WHERE group_post_comments.id = $1");
    let comment = sqlx::query_as::<Sqlite, Comment>(&query)
        .bind(comment_id)
        .fetch_one(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(comment)
}

/// The author or any admin of the group.
pub async fn delete_group_post_in_db(
    pool: &SqlitePool,
    user_id: i64,
    post_id: i64,
) -> Result<(), RequestError> {
    let mut tx = begin_write(pool).await?;
    let post = fetch_group_post(&mut tx, post_id).await?;
    if post.author_id != user_id {
        let group = fetch_group(&mut tx, user_id, post.group_id).await?;
        require_admin(&group)?;
    }
    sqlx::query("DELETE FROM group_posts WHERE id = $1")
        .bind(post_id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::list_notifications_in_db;
    use crate::db_helpers::test_support::{create_user, test_pool};
    use crate::models::NotificationType;

    fn new_group(name: &str, is_private: bool) -> CreateGroupRequest {
        CreateGroupRequest {
            name: name.to_string(),
            description: String::new(),
            avatar: None,
            is_private,
        }
    }

    fn post(content: &str) -> PostRequest {
        PostRequest {
            content: content.to_string(),
            image: None,
        }
    }

    #[tokio::test]
    async fn creator_is_admin_member() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let group = create_group_in_db(&pool, alice, new_group("rustaceans", false))
            .await
            .unwrap();
        assert_eq!(group.viewer_role, Some(GroupRole::Admin));
        assert_eq!(group.members_count, 1);
    }

    #[tokio::test]
    async fn join_and_leave_rules() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let group = create_group_in_db(&pool, alice, new_group("open", false))
            .await
            .unwrap();

        let joined = join_group_in_db(&pool, bob, group.id).await.unwrap();
        assert_eq!(joined.viewer_role, Some(GroupRole::Member));
        assert_eq!(joined.members_count, 2);
        assert!(matches!(
            join_group_in_db(&pool, bob, group.id).await.unwrap_err(),
            RequestError::RunTimeError(_)
        ));

        assert!(matches!(
            leave_group_in_db(&pool, alice, group.id).await.unwrap_err(),
            RequestError::RunTimeError(_)
        ));
        leave_group_in_db(&pool, bob, group.id).await.unwrap();
        assert!(matches!(
            leave_group_in_db(&pool, bob, group.id).await.unwrap_err(),
            RequestError::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn private_group_needs_admin() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let group = create_group_in_db(&pool, alice, new_group("secret", true))
            .await
            .unwrap();
        create_group_post_in_db(&pool, alice, group.id, post("members only"))
            .await
            .unwrap();

        assert!(matches!(
            join_group_in_db(&pool, bob, group.id).await.unwrap_err(),
            RequestError::Forbidden(_)
        ));
        let outside = get_group_detail_in_db(&pool, bob, group.id).await.unwrap();
        assert!(outside.posts.is_empty());
        assert!(outside.members.is_empty());

        assert!(matches!(
            add_group_member_in_db(&pool, bob, group.id, bob)
                .await
                .unwrap_err(),
            RequestError::Forbidden(_)
        ));
        add_group_member_in_db(&pool, alice, group.id, bob)
            .await
            .unwrap();
        let inside = get_group_detail_in_db(&pool, bob, group.id).await.unwrap();
        assert_eq!(inside.posts.len(), 1);
        assert_eq!(inside.members.len(), 2);
    }

    #[tokio::test]
    async fn posting_fans_out_and_comments_notify_author() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let carol = create_user(&pool, "carol").await;
        let group = create_group_in_db(&pool, alice, new_group("club", false))
            .await
            .unwrap();
        join_group_in_db(&pool, bob, group.id).await.unwrap();
        join_group_in_db(&pool, carol, group.id).await.unwrap();

        let created = create_group_post_in_db(&pool, alice, group.id, post("meeting at 5"))
            .await
            .unwrap();
        for member in [bob, carol] {
            let (notifications, _) = list_notifications_in_db(&pool, member).await.unwrap();
            assert_eq!(notifications.len(), 1);
            assert_eq!(notifications[0].notification_type, NotificationType::GroupPost);
        }
        assert!(list_notifications_in_db(&pool, alice).await.unwrap().0.is_empty());

        comment_group_post_in_db(&pool, alice, created.id, "own comment")
            .await
            .unwrap();
        comment_group_post_in_db(&pool, bob, created.id, "see you there")
            .await
            .unwrap();
        let (notifications, _) = list_notifications_in_db(&pool, alice).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].notification_type, NotificationType::Comment);

        let detail = get_group_detail_in_db(&pool, carol, group.id).await.unwrap();
        let (_, comments) = &detail.posts[0];
        assert_eq!(comments[0].content, "own comment");
        assert_eq!(comments[1].content, "see you there");
    }

    #[tokio::test]
    async fn non_members_cannot_post_and_delete_cascades() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let group = create_group_in_db(&pool, alice, new_group("club", false))
            .await
            .unwrap();
        assert!(matches!(
            create_group_post_in_db(&pool, bob, group.id, post("hi"))
                .await
                .unwrap_err(),
            RequestError::Forbidden(_)
        ));
        let created = create_group_post_in_db(&pool, alice, group.id, post("hi"))
            .await
            .unwrap();
        comment_group_post_in_db(&pool, alice, created.id, "c")
            .await
            .unwrap();

        assert!(matches!(
            delete_group_in_db(&pool, bob, group.id).await.unwrap_err(),
            RequestError::Forbidden(_)
        ));
        delete_group_in_db(&pool, alice, group.id).await.unwrap();
        let (posts, comments, memberships): (i64, i64, i64) = sqlx::query_as(
            r#"SELECT (SELECT COUNT(*) FROM group_posts),
                      (SELECT COUNT(*) FROM group_post_comments),
                      (SELECT COUNT(*) FROM group_memberships)"#,
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!((posts, comments, memberships), (0, 0, 0));
    }

    #[tokio::test]
    async fn admin_can_delete_member_post() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let carol = create_user(&pool, "carol").await;
        let group = create_group_in_db(&pool, alice, new_group("club", false))
            .await
            .unwrap();
        join_group_in_db(&pool, bob, group.id).await.unwrap();
        join_group_in_db(&pool, carol, group.id).await.unwrap();
        let created = create_group_post_in_db(&pool, bob, group.id, post("spam"))
            .await
            .unwrap();

        assert!(matches!(
            delete_group_post_in_db(&pool, carol, created.id)
                .await
                .unwrap_err(),
            RequestError::Forbidden(_)
        ));
        delete_group_post_in_db(&pool, alice, created.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_is_admin_only() {
        let pool = test_pool().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let group = create_group_in_db(&pool, alice, new_group("club", false))
            .await
            .unwrap();
        join_group_in_db(&pool, bob, group.id).await.unwrap();
        let changes = || UpdateGroupRequest {
            name: Some("renamed".into()),
            is_private: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            update_group_in_db(&pool, bob, group.id, changes())
                .await
                .unwrap_err(),
            RequestError::Forbidden(_)
        ));
        let updated = update_group_in_db(&pool, alice, group.id, changes())
            .await
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert!(updated.is_private);

        let found = list_groups_in_db(&pool, bob, Some("ren")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].viewer_role, Some(GroupRole::Member));
    }
}
