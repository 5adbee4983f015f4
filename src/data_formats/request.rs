use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::RequestError;

const USERNAME_MAX: usize = 150;
const USERNAME_MIN: usize = 3;
const PASSWORD_MIN: usize = 8;
const BIO_MAX: usize = 500;
const LOCATION_MAX: usize = 100;
const PHONE_MAX: usize = 20;
const GROUP_NAME_MAX: usize = 100;
const TITLE_MAX: usize = 200;

fn validate_username(username: &str) -> Result<(), RequestError> {
    let length = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&length) {
        return Err(RequestError::RunTimeError(
            "Username must be between 3 and 150 characters",
        ));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || "_.@+-".contains(c);
    if !username.chars().all(allowed) {
        return Err(RequestError::RunTimeError(
            "Username may only contain letters, digits and _.@+-",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), RequestError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(RequestError::RunTimeError(
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

fn validate_max(value: Option<&str>, max: usize, message: &'static str) -> Result<(), RequestError> {
    match value {
        Some(value) if value.chars().count() > max => Err(RequestError::RunTimeError(message)),
        _ => Ok(()),
    }
}

fn validate_content(content: &str, message: &'static str) -> Result<(), RequestError> {
    if content.trim().is_empty() {
        return Err(RequestError::RunTimeError(message));
    }
    Ok(())
}

// ----------------- User Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        validate_username(&self.username)?;
        validate_password(&self.password)
    }
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        match &self.password {
            Some(password) => validate_password(password),
            None => Ok(()),
        }
    }
}

// ----------------- Profile Request -----------------
#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        validate_max(self.bio.as_deref(), BIO_MAX, "Bio must be at most 500 characters")?;
        validate_max(
            self.location.as_deref(),
            LOCATION_MAX,
            "Location must be at most 100 characters",
        )?;
        validate_max(self.phone.as_deref(), PHONE_MAX, "Phone must be at most 20 characters")?;
        if let Some(website) = self.website.as_deref().map(str::trim) {
            if !website.is_empty()
                && !website.starts_with("http://")
                && !website.starts_with("https://")
            {
                return Err(RequestError::RunTimeError(
                    "Website must start with http:// or https://",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ReviewRequest {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

// ----------------- Messaging Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct StartConversationRequest {
    pub user_id: i64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct MessageRequest {
    pub content: String,
}

// ----------------- Group Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

impl CreateGroupRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        validate_group_name(&self.name)
    }
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub is_private: Option<bool>,
}

impl UpdateGroupRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        match &self.name {
            Some(name) => validate_group_name(name),
            None => Ok(()),
        }
    }
}

fn validate_group_name(name: &str) -> Result<(), RequestError> {
    let length = name.trim().chars().count();
    if length == 0 || length > GROUP_NAME_MAX {
        return Err(RequestError::RunTimeError(
            "Group name must be between 1 and 100 characters",
        ));
    }
    Ok(())
}

// ----------------- Post Request -----------------
/// Body of both feed posts and group posts.
#[derive(Deserialize, Serialize, Debug)]
pub struct PostRequest {
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl PostRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        validate_content(&self.content, "Post cannot be empty")
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CommentRequest {
    pub content: String,
}

// ----------------- News Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct NewsRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
}

impl NewsRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        validate_title(&self.title)?;
        validate_content(&self.content, "News content cannot be empty")
    }
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct UpdateNewsRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub is_pinned: Option<bool>,
}

impl UpdateNewsRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(content) = &self.content {
            validate_content(content, "News content cannot be empty")?;
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), RequestError> {
    let length = title.trim().chars().count();
    if length == 0 || length > TITLE_MAX {
        return Err(RequestError::RunTimeError(
            "Title must be between 1 and 200 characters",
        ));
    }
    Ok(())
}
