use serde::{Deserialize, Serialize};

use crate::db_helpers::FriendRequestOutcome;
use crate::models::UserSummary;

use super::response::{
    ConversationResponse, FriendRequestResponse, FriendshipResponse, GroupResponse,
    NotificationResponse, PostResponse, ReviewResponse,
};

#[derive(Debug, Deserialize, Serialize)]
pub struct UserWrapper<T> {
    pub user: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MultipleUsersWrapper {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProfileWrapper<T> {
    pub profile: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FriendshipWrapper {
    pub friendship: FriendshipResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<FriendRequestOutcome>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FriendsWrapper {
    pub friends: Vec<UserSummary>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FriendRequestsWrapper {
    pub incoming: Vec<FriendRequestResponse>,
    pub outgoing: Vec<FriendRequestResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FollowWrapper {
    pub user_id: i64,
    pub following: bool,
    /// `false` when the call left the edge as it already was.
    pub changed: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FollowersWrapper {
    pub followers: Vec<UserSummary>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FollowingWrapper {
    pub following: Vec<UserSummary>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConversationWrapper<T> {
    pub conversation: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MultipleConversationsWrapper {
    pub conversations: Vec<ConversationResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MessageWrapper<T> {
    pub message: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GroupWrapper<T> {
    pub group: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MultipleGroupsWrapper {
    pub groups: Vec<GroupResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostWrapper<T> {
    pub post: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MultiplePostsWrapper {
    pub posts: Vec<PostResponse>,
    #[serde(rename = "postsCount")]
    pub posts_count: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentWrapper<T> {
    pub comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LikeWrapper {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NotificationsWrapper {
    pub notifications: Vec<NotificationResponse>,
    pub unread_count: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MarkedReadWrapper {
    pub updated: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReviewWrapper<T> {
    pub review: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MultipleReviewsWrapper {
    pub reviews: Vec<ReviewResponse>,
    pub average_rating: Option<f64>,
}

/// `{"news": …}` for both a single item and a list.
#[derive(Debug, Deserialize, Serialize)]
pub struct NewsWrapper<T> {
    pub news: T,
}

impl<T> UserWrapper<T> {
    pub fn wrap_with_user_data(request: T) -> UserWrapper<T> {
        UserWrapper { user: request }
    }
}
