/// Account operations outside the session lifecycle
///
/// Registration, profile edits, channel profiles, subscriptions and watch
/// history. Media uploads go through `MediaStore`; a failed avatar upload is
/// bad input, a failed cover-image upload leaves the cover empty.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::{hash_off_thread, validate_password_input, PasswordHasher};
use crate::error::{AppError, ValidationError};
use crate::media::MediaStore;
use crate::store::{ChannelProfile, NewUser, SanitizedUser, UserStore, WatchedVideo};
use crate::validators::{is_valid_email, is_valid_full_name, is_valid_username, require_non_blank};

/// Raw registration input. The file paths point at parts staged by
/// `uploads::StagingArea`, never at client-supplied locations.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub avatar_local_path: Option<String>,
    pub cover_image_local_path: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    media: Arc<dyn MediaStore>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            store,
            hasher,
            media,
        }
    }

    pub async fn register(&self, registration: Registration) -> Result<SanitizedUser, AppError> {
        let fields = [
            &registration.full_name,
            &registration.email,
            &registration.username,
            &registration.password,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AppError::invalid("All fields are required"));
        }

        let full_name = is_valid_full_name(&registration.full_name)?;
        let email = is_valid_email(&registration.email)?;
        let username = is_valid_username(&registration.username)?;
        validate_password_input("password", &registration.password)?;

        if self.store.find_by_login_identifier(&username).await?.is_some()
            || self.store.find_by_login_identifier(&email).await?.is_some()
        {
            return Err(AppError::duplicate("User with email or username already exists"));
        }

        let avatar_path = registration
            .avatar_local_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::invalid("Avatar file is required"))?;

        let avatar = self.media.upload(avatar_path).await.map_err(|e| {
            tracing::warn!(error = %e, "Avatar upload failed during registration");
            AppError::invalid("Avatar file is required")
        })?;

        let cover_image = match registration
            .cover_image_local_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            Some(path) => match self.media.upload(path).await {
                Ok(media) => Some(media.url),
                Err(e) => {
                    tracing::warn!(error = %e, "Cover image upload failed, continuing without one");
                    None
                }
            },
            None => None,
        };

        let password_hash = hash_off_thread(self.hasher.clone(), registration.password).await?;

        let user = self
            .store
            .create(NewUser {
                username,
                email,
                full_name,
                password_hash,
                avatar: avatar.url,
                cover_image,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(SanitizedUser::from(user))
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<SanitizedUser, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(SanitizedUser::from)
            .ok_or_else(|| AppError::not_found("User does not exist"))
    }

    pub async fn update_account(
        &self,
        user_id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<SanitizedUser, AppError> {
        if full_name.trim().is_empty() || email.trim().is_empty() {
            return Err(AppError::invalid("All fields are required"));
        }
        let full_name = is_valid_full_name(full_name)?;
        let email = is_valid_email(email)?;

        if let Some(existing) = self.store.find_by_login_identifier(&email).await? {
            if existing.id != user_id {
                return Err(AppError::duplicate("User with this email already exists"));
            }
        }

        let user = self.store.update_account(user_id, &full_name, &email).await?;
        Ok(SanitizedUser::from(user))
    }

    pub async fn update_avatar(
        &self,
        user_id: Uuid,
        local_path: Option<&str>,
    ) -> Result<SanitizedUser, AppError> {
        let path = required_path(local_path, "Avatar file is missing")?;
        let media = self.media.upload(&path).await.map_err(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "Avatar upload failed");
            AppError::invalid("Error while uploading avatar")
        })?;

        let user = self.store.update_avatar(user_id, &media.url).await?;
        Ok(SanitizedUser::from(user))
    }

    pub async fn update_cover_image(
        &self,
        user_id: Uuid,
        local_path: Option<&str>,
    ) -> Result<SanitizedUser, AppError> {
        let path = required_path(local_path, "Cover image file is missing")?;
        let media = self.media.upload(&path).await.map_err(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "Cover image upload failed");
            AppError::invalid("Error while uploading cover image")
        })?;

        let user = self.store.update_cover_image(user_id, &media.url).await?;
        Ok(SanitizedUser::from(user))
    }

    pub async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Uuid,
    ) -> Result<ChannelProfile, AppError> {
        let username = require_non_blank("username", username)
            .map_err(|_| AppError::invalid("username is missing"))?;
        self.store
            .channel_profile(&username, viewer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Channel does not exist"))
    }

    /// Returns `true` when the subscriber is now subscribed
    pub async fn toggle_subscription(
        &self,
        subscriber_id: Uuid,
        channel_id: Uuid,
    ) -> Result<bool, AppError> {
        if subscriber_id == channel_id {
            return Err(AppError::invalid("You cannot subscribe to your own channel"));
        }
        let subscribed = self
            .store
            .toggle_subscription(subscriber_id, channel_id)
            .await?;
        tracing::info!(
            subscriber_id = %subscriber_id,
            channel_id = %channel_id,
            subscribed,
            "Subscription toggled"
        );
        Ok(subscribed)
    }

    pub async fn record_watch(&self, user_id: Uuid, video_id: Uuid) -> Result<(), AppError> {
        self.store.record_watch(user_id, video_id).await
    }

    pub async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, AppError> {
        self.store.watch_history(user_id).await
    }
}

fn required_path(local_path: Option<&str>, message: &str) -> Result<String, ValidationError> {
    local_path
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ValidationError::Invalid(message.to_string()))
}
