use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_superuser: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub user_id: i64,
    pub username: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub location: String,
    pub website: String,
    pub phone: String,
    pub created_at: NaiveDateTime,
}

/// Lightweight user reference used in lists and nested resources.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Friendship {
    pub id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub status: FriendshipStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Conversation {
    pub id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub is_read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Member,
    Admin,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub avatar: Option<String>,
    pub creator_id: i64,
    pub is_private: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub members_count: i64,
    pub viewer_role: Option<GroupRole>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupMember {
    pub user_id: i64,
    pub username: String,
    pub role: GroupRole,
    pub joined_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupPost {
    pub id: i64,
    pub group_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Comment row shared by group posts and feed posts.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub likes_count: i64,
    pub comments_count: i64,
    pub liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    FriendRequest,
    FriendAccept,
    Follow,
    Message,
    GroupPost,
    Comment,
    Like,
    Review,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub sender_id: Option<i64>,
    pub sender_username: Option<String>,
    pub notification_type: NotificationType,
    pub text: String,
    pub link: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub reviewer_id: i64,
    pub reviewer_username: String,
    pub reviewed_user_id: i64,
    pub rating: i64,
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct News {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub author_id: i64,
    pub author_username: String,
    pub is_pinned: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// How the viewer relates to a profile they are looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    #[serde(rename = "self")]
    Myself,
    Friends,
    RequestSent,
    RequestReceived,
    None,
}

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub profile: Profile,
    pub relation: Relation,
    pub friendship_id: Option<i64>,
    pub following: bool,
    pub followed_by: bool,
    pub stats: ProfileStats,
}

#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct ProfileStats {
    pub followers_count: i64,
    pub following_count: i64,
    pub friends_count: i64,
    pub reviews_count: i64,
    pub average_rating: Option<f64>,
}

/// A friendship row seen from one side, joined with the other user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FriendRequest {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub status: FriendshipStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<Message>,
    pub unread_count: i64,
}

#[derive(Debug, Clone)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub participants: Vec<UserSummary>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone)]
pub struct GroupDetail {
    pub group: Group,
    pub members: Vec<GroupMember>,
    pub posts: Vec<(GroupPost, Vec<Comment>)>,
}
