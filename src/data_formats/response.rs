use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{
    Comment, Conversation, ConversationDetail, ConversationSummary, FriendRequest, Friendship,
    FriendshipStatus, Group, GroupDetail, GroupMember, GroupPost, GroupRole, Message, News,
    Notification, NotificationType, Post, Profile, ProfileView, Relation, Review, User,
    UserSummary,
};

// ----------------- Accounts -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_superuser: bool,
    pub created_at: NaiveDateTime,
    pub token: String,
}

impl UserResponse {
    pub fn new(
        User {
            id,
            username,
            email,
            is_superuser,
            created_at,
            ..
        }: User,
        token: String,
    ) -> Self {
        UserResponse {
            id,
            username,
            email,
            is_superuser,
            created_at,
            token,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ProfileResponse {
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

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        ProfileResponse {
            user_id: profile.user_id,
            username: profile.username,
            bio: profile.bio,
            avatar: profile.avatar,
            birth_date: profile.birth_date,
            location: profile.location,
            website: profile.website,
            phone: profile.phone,
            created_at: profile.created_at,
        }
    }
}

/// Someone else's profile as the viewer sees it.
#[derive(Deserialize, Serialize, Debug)]
pub struct ProfileViewResponse {
    #[serde(flatten)]
    pub profile: ProfileResponse,
    pub relation: Relation,
    pub friendship_id: Option<i64>,
    pub following: bool,
    pub followed_by: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub friends_count: i64,
    pub reviews_count: i64,
    pub average_rating: Option<f64>,
}

impl From<ProfileView> for ProfileViewResponse {
    fn from(view: ProfileView) -> Self {
        ProfileViewResponse {
            profile: view.profile.into(),
            relation: view.relation,
            friendship_id: view.friendship_id,
            following: view.following,
            followed_by: view.followed_by,
            followers_count: view.stats.followers_count,
            following_count: view.stats.following_count,
            friends_count: view.stats.friends_count,
            reviews_count: view.stats.reviews_count,
            average_rating: view.stats.average_rating,
        }
    }
}

// ----------------- Friendships -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct FriendshipResponse {
    pub id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub status: FriendshipStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Friendship> for FriendshipResponse {
    fn from(f: Friendship) -> Self {
        FriendshipResponse {
            id: f.id,
            from_user_id: f.from_user_id,
            to_user_id: f.to_user_id,
            status: f.status,
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct FriendRequestResponse {
    pub id: i64,
    pub user: UserSummary,
    pub status: FriendshipStatus,
    pub created_at: NaiveDateTime,
}

impl From<FriendRequest> for FriendRequestResponse {
    fn from(request: FriendRequest) -> Self {
        FriendRequestResponse {
            id: request.id,
            user: UserSummary {
                id: request.user_id,
                username: request.username,
                avatar: request.avatar,
            },
            status: request.status,
            created_at: request.created_at,
        }
    }
}

// ----------------- Messaging -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct MessageResponse {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub is_read: bool,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        MessageResponse {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender: message.sender_username,
            content: message.content,
            created_at: message.created_at,
            is_read: message.is_read,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ConversationResponse {
    pub id: i64,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<MessageResponse>,
    pub unread_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ConversationResponse {
    pub fn new(Conversation { id, created_at, updated_at }: Conversation) -> Self {
        ConversationResponse {
            id,
            participants: vec![],
            last_message: None,
            unread_count: 0,
            created_at,
            updated_at,
        }
    }
}

impl From<ConversationSummary> for ConversationResponse {
    fn from(summary: ConversationSummary) -> Self {
        ConversationResponse {
            participants: summary.participants,
            last_message: summary.last_message.map(Into::into),
            unread_count: summary.unread_count,
            ..ConversationResponse::new(summary.conversation)
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ConversationDetailResponse {
    pub id: i64,
    pub participants: Vec<UserSummary>,
    pub messages: Vec<MessageResponse>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<ConversationDetail> for ConversationDetailResponse {
    fn from(detail: ConversationDetail) -> Self {
        ConversationDetailResponse {
            id: detail.conversation.id,
            participants: detail.participants,
            messages: detail.messages.into_iter().map(Into::into).collect(),
            created_at: detail.conversation.created_at,
            updated_at: detail.conversation.updated_at,
        }
    }
}

// ----------------- Groups -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct GroupResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub avatar: Option<String>,
    pub creator_id: i64,
    pub is_private: bool,
    pub members_count: i64,
    pub role: Option<GroupRole>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        GroupResponse {
            id: group.id,
            name: group.name,
            description: group.description,
            avatar: group.avatar,
            creator_id: group.creator_id,
            is_private: group.is_private,
            members_count: group.members_count,
            role: group.viewer_role,
            created_at: group.created_at,
            updated_at: group.updated_at,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GroupMemberResponse {
    pub user_id: i64,
    pub username: String,
    pub role: GroupRole,
    pub joined_at: NaiveDateTime,
}

impl From<GroupMember> for GroupMemberResponse {
    fn from(member: GroupMember) -> Self {
        GroupMemberResponse {
            user_id: member.user_id,
            username: member.username,
            role: member.role,
            joined_at: member.joined_at,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GroupPostResponse {
    pub id: i64,
    pub group_id: i64,
    pub author_id: i64,
    pub author: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub comments: Vec<CommentResponse>,
}

impl GroupPostResponse {
    pub fn new(post: GroupPost, comments: Vec<Comment>) -> Self {
        GroupPostResponse {
            id: post.id,
            group_id: post.group_id,
            author_id: post.author_id,
            author: post.author_username,
            content: post.content,
            image: post.image,
            created_at: post.created_at,
            updated_at: post.updated_at,
            comments: comments.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GroupDetailResponse {
    #[serde(flatten)]
    pub group: GroupResponse,
    pub members: Vec<GroupMemberResponse>,
    pub posts: Vec<GroupPostResponse>,
}

impl From<GroupDetail> for GroupDetailResponse {
    fn from(detail: GroupDetail) -> Self {
        GroupDetailResponse {
            group: detail.group.into(),
            members: detail.members.into_iter().map(Into::into).collect(),
            posts: detail
                .posts
                .into_iter()
                .map(|(post, comments)| GroupPostResponse::new(post, comments))
                .collect(),
        }
    }
}

// ----------------- Feed -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author: String,
    pub content: String,
    pub created_at: NaiveDateTime,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        CommentResponse {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author: comment.author_username,
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct PostResponse {
    pub id: i64,
    pub author_id: i64,
    pub author: String,
    pub content: String,
    pub image: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub liked: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentResponse>>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        PostResponse {
            id: post.id,
            author_id: post.author_id,
            author: post.author_username,
            content: post.content,
            image: post.image,
            likes_count: post.likes_count,
            comments_count: post.comments_count,
            liked: post.liked,
            created_at: post.created_at,
            updated_at: post.updated_at,
            comments: None,
        }
    }
}

impl PostResponse {
    pub fn with_comments(post: Post, comments: Vec<Comment>) -> Self {
        PostResponse {
            comments: Some(comments.into_iter().map(Into::into).collect()),
            ..post.into()
        }
    }
}

// ----------------- Notifications -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct NotificationResponse {
    pub id: i64,
    pub sender: Option<String>,
    pub notification_type: NotificationType,
    pub text: String,
    pub link: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        NotificationResponse {
            id: n.id,
            sender: n.sender_username,
            notification_type: n.notification_type,
            text: n.text,
            link: n.link,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

// ----------------- Reviews -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct ReviewResponse {
    pub id: i64,
    pub reviewer_id: i64,
    pub reviewer: String,
    pub reviewed_user_id: i64,
    pub rating: i64,
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        ReviewResponse {
            id: review.id,
            reviewer_id: review.reviewer_id,
            reviewer: review.reviewer_username,
            reviewed_user_id: review.reviewed_user_id,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

// ----------------- News -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct NewsResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub author: String,
    pub is_pinned: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<News> for NewsResponse {
    fn from(news: News) -> Self {
        NewsResponse {
            id: news.id,
            title: news.title,
            content: news.content,
            image: news.image,
            author: news.author_username,
            is_pinned: news.is_pinned,
            created_at: news.created_at,
            updated_at: news.updated_at,
        }
    }
}
