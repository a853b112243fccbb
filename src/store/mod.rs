/// Credential store
///
/// `UserStore` is the persistence seam for user records, refresh-token
/// fingerprints, subscriptions and watch history. Two backends implement it:
/// Postgres for production and an in-memory map for tests and local runs.

mod memory;
mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Full user record as persisted. Never serialized directly.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub password_hash: String,
    /// SHA-256 fingerprint of the most recently issued refresh token
    pub refresh_token_hash: Option<String>,
    pub watch_history: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outward-facing user representation: no password hash, no refresh token
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub watch_history: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for SanitizedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone().unwrap_or_default(),
            watch_history: user.watch_history.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for SanitizedUser {
    fn from(user: User) -> Self {
        SanitizedUser::from(&user)
    }
}

/// Fields required to create a user; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar: String,
    pub cover_image: Option<String>,
}

/// A channel (user) as seen by another user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

/// Video catalog entry. Videos are published by another subsystem; this
/// crate only reads them to enrich watch history.
#[derive(Debug, Clone)]
pub struct Video {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoOwner {
    pub username: String,
    pub full_name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchedVideo {
    pub id: Uuid,
    pub title: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub owner: VideoOwner,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive lookup by username or email
    async fn find_by_login_identifier(&self, identifier: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Fails with a duplicate-identity error if username or email is taken
    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;

    /// Overwrites only the refresh-token field
    async fn persist_refresh_token(
        &self,
        id: Uuid,
        fingerprint: Option<&str>,
    ) -> Result<(), AppError>;

    /// Compare-and-swap on the refresh-token field. Returns `false` when the
    /// stored value was not `expected`, leaving the record untouched.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, AppError>;

    /// Stores a new password hash. With `revoke_session` the refresh-token
    /// field is cleared in the same write.
    async fn replace_password(
        &self,
        id: Uuid,
        password_hash: &str,
        revoke_session: bool,
    ) -> Result<(), AppError>;

    async fn update_account(&self, id: Uuid, full_name: &str, email: &str)
        -> Result<User, AppError>;

    async fn update_avatar(&self, id: Uuid, url: &str) -> Result<User, AppError>;

    async fn update_cover_image(&self, id: Uuid, url: &str) -> Result<User, AppError>;

    async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Uuid,
    ) -> Result<Option<ChannelProfile>, AppError>;

    /// Returns `true` when the subscriber is now subscribed
    async fn toggle_subscription(
        &self,
        subscriber_id: Uuid,
        channel_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn record_watch(&self, user_id: Uuid, video_id: Uuid) -> Result<(), AppError>;

    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, AppError>;
}

fn user_not_found() -> AppError {
    AppError::not_found("User does not exist")
}
