use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use validator::Validate;

use crate::error::FieldErrors;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

// --- Roles ---

/// Role
///
/// Closed classification of a user. Only `Admin` may write administrative resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(UnknownRole(value)),
        }
    }
}

// --- Core records (mapped to database rows) ---

/// User
///
/// The `users` row. `password` holds the argon2 PHC string and is never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_staff: bool,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, FromRow)]
#[ts(export)]
pub struct District {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, FromRow)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

// --- Response views ---

/// Area
///
/// An area with its parent district nested, as returned by every area endpoint
/// and embedded in news items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Area {
    pub id: i64,
    pub name: String,
    pub district: District,
}

/// News
///
/// A news item with category and area (and the area's district) expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct News {
    pub id: i64,
    pub title: String,
    pub content: String,
    // Object key of the uploaded image, if any.
    pub image: Option<String>,
    pub category: Category,
    pub area: Area,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Comment
///
/// `user` is the author's username, resolved by a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, FromRow)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub news: i64,
    pub user: String,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserInfo
///
/// Profile of the authenticated caller (GET /auth/me/).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserInfo {
    pub username: String,
    pub email: String,
    pub role: Role,
    #[ts(type = "string | null")]
    pub last_login: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub date_joined: DateTime<Utc>,
    pub is_active: bool,
    pub is_staff: bool,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            last_login: user.last_login,
            date_joined: user.date_joined,
            is_active: user.is_active,
            is_staff: user.is_staff,
        }
    }
}

/// RegisteredUser
///
/// Echo of the accepted registration fields. Passwords are never echoed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegisteredUser {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RegistrationResponse {
    pub payload: RegisteredUser,
    pub role: Role,
}

// --- Store inputs ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_staff: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewArea {
    pub name: String,
    pub district_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaChanges {
    pub name: Option<String>,
    pub district_id: Option<i64>,
}

impl From<NewArea> for AreaChanges {
    fn from(area: NewArea) -> Self {
        Self { name: Some(area.name), district_id: Some(area.district_id) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNews {
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub area_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub area_id: Option<i64>,
}

impl From<NewNews> for NewsChanges {
    fn from(news: NewNews) -> Self {
        Self {
            title: Some(news.title),
            content: Some(news.content),
            category_id: Some(news.category_id),
            area_id: Some(news.area_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub news_id: i64,
    pub user_id: i64,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentChanges {
    pub news_id: Option<i64>,
    pub content: Option<String>,
}

// --- Request payloads ---

/// Trims surrounding whitespace, matching how text fields are cleaned on input.
fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|s| s.trim().to_string()))
}

/// Like `trimmed`, but an empty string counts as not provided.
fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(trimmed(deserializer)?.filter(|s| !s.is_empty()))
}

/// Records a missing or blank text field; returns the value when usable.
fn take_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(text) => present_text(errors, field, Some(text)),
    }
}

/// Blank check for a field that may be omitted (partial update).
fn present_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(text) if text.is_empty() => {
            errors.add(field, BLANK);
            None
        }
        other => other,
    }
}

fn take_id(errors: &mut FieldErrors, field: &str, value: Option<i64>) -> Option<i64> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

fn validated<T: Validate>(payload: &T) -> FieldErrors {
    match payload.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => errors.into(),
    }
}

/// NamePayload
///
/// Write body for categories and districts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NamePayload {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub name: Option<String>,
}

impl NamePayload {
    /// Full write (create or PUT): the name is required.
    pub fn into_name(self) -> Result<String, FieldErrors> {
        let mut errors = validated(&self);
        let name = take_text(&mut errors, "name", self.name);
        errors.into_result()?;
        Ok(name.unwrap_or_default())
    }

    /// Partial write (PATCH): returns `None` when the name is not being changed.
    pub fn into_change(self) -> Result<Option<String>, FieldErrors> {
        let mut errors = validated(&self);
        let name = present_text(&mut errors, "name", self.name);
        errors.into_result()?;
        Ok(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AreaPayload {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub name: Option<String>,
    #[serde(default)]
    pub district_id: Option<i64>,
}

impl AreaPayload {
    pub fn into_new(self) -> Result<NewArea, FieldErrors> {
        let mut errors = validated(&self);
        let name = take_text(&mut errors, "name", self.name);
        let district_id = take_id(&mut errors, "district_id", self.district_id);
        errors.into_result()?;
        match (name, district_id) {
            (Some(name), Some(district_id)) => Ok(NewArea { name, district_id }),
            _ => Err(FieldErrors::single("non_field_errors", REQUIRED)),
        }
    }

    pub fn into_changes(self) -> Result<AreaChanges, FieldErrors> {
        let mut errors = validated(&self);
        let name = present_text(&mut errors, "name", self.name);
        errors.into_result()?;
        Ok(AreaChanges { name, district_id: self.district_id })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewsPayload {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    pub content: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub area_id: Option<i64>,
}

impl NewsPayload {
    pub fn into_new(self) -> Result<NewNews, FieldErrors> {
        let mut errors = validated(&self);
        let title = take_text(&mut errors, "title", self.title);
        let content = take_text(&mut errors, "content", self.content);
        let category_id = take_id(&mut errors, "category_id", self.category_id);
        let area_id = take_id(&mut errors, "area_id", self.area_id);
        errors.into_result()?;
        match (title, content, category_id, area_id) {
            (Some(title), Some(content), Some(category_id), Some(area_id)) => {
                Ok(NewNews { title, content, category_id, area_id })
            }
            _ => Err(FieldErrors::single("non_field_errors", REQUIRED)),
        }
    }

    pub fn into_changes(self) -> Result<NewsChanges, FieldErrors> {
        let mut errors = validated(&self);
        let title = present_text(&mut errors, "title", self.title);
        let content = present_text(&mut errors, "content", self.content);
        errors.into_result()?;
        Ok(NewsChanges { title, content, category_id: self.category_id, area_id: self.area_id })
    }
}

/// CommentPayload
///
/// Only `news` and `content` are writable. Author fields sent by the client
/// (`user`, `author`) are not part of the payload and are dropped on decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentPayload {
    #[serde(default)]
    pub news: Option<i64>,
    #[serde(default, deserialize_with = "trimmed")]
    pub content: Option<String>,
}

impl CommentPayload {
    pub fn into_new(self, user_id: i64) -> Result<NewComment, FieldErrors> {
        let mut errors = FieldErrors::new();
        let news_id = take_id(&mut errors, "news", self.news);
        let content = take_text(&mut errors, "content", self.content);
        errors.into_result()?;
        match (news_id, content) {
            (Some(news_id), Some(content)) => Ok(NewComment { news_id, user_id, content }),
            _ => Err(FieldErrors::single("non_field_errors", REQUIRED)),
        }
    }

    pub fn into_changes(self) -> Result<CommentChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        let content = present_text(&mut errors, "content", self.content);
        errors.into_result()?;
        Ok(CommentChanges { news_id: self.news, content })
    }
}

/// RegisterRequest
///
/// Body of both registration endpoints. A `role` field, if sent, is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password2: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
}

/// Fields of a registration that passed shape validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Field-level checks: presence, lengths, username characters, email format
    /// and password confirmation. Password strength and uniqueness are checked by
    /// the caller, which merges its own errors into the same map.
    pub fn into_registration(self) -> Result<Registration, FieldErrors> {
        let mut errors = validated(&self);
        let username = take_text(&mut errors, "username", self.username);
        if let Some(name) = &username {
            if !name.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            }
        }
        let password = match self.password {
            Some(p) if !p.is_empty() => Some(p),
            Some(_) => {
                errors.add("password", BLANK);
                None
            }
            None => {
                errors.add("password", REQUIRED);
                None
            }
        };
        match (&password, self.password2.as_deref()) {
            (_, None) => errors.add("password2", REQUIRED),
            (_, Some("")) => errors.add("password2", BLANK),
            (Some(first), Some(second)) if first != second => {
                errors.add("password", "Password fields didn't match.")
            }
            _ => {}
        }
        errors.into_result()?;
        Ok(Registration {
            username: username.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn into_credentials(self) -> Result<(String, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = take_text(&mut errors, "username", self.username.map(|u| u.trim().to_string()));
        let password = take_text(&mut errors, "password", self.password);
        errors.into_result()?;
        Ok((username.unwrap_or_default(), password.unwrap_or_default()))
    }
}
