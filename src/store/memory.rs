use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    user_not_found, ChannelProfile, NewUser, User, UserStore, Video, VideoOwner, WatchedVideo,
};
use crate::error::AppError;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    videos: HashMap<Uuid, Video>,
    /// (subscriber, channel)
    subscriptions: HashSet<(Uuid, Uuid)>,
}

impl MemoryState {
    fn identity_taken(&self, username: &str, email: &str, except: Option<Uuid>) -> bool {
        self.users.values().any(|u| {
            Some(u.id) != except && (u.username == username || u.email == email)
        })
    }

    fn user_mut(&mut self, id: Uuid) -> Result<&mut User, AppError> {
        self.users.get_mut(&id).ok_or_else(user_not_found)
    }
}

/// In-process user store. Every mutation runs under a single write guard,
/// so read-modify-write sequences on one record are atomic.
#[derive(Default)]
pub struct InMemoryUserStore {
    state: RwLock<MemoryState>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a catalog video so it can appear in watch history
    pub async fn insert_video(&self, video: Video) {
        self.state.write().await.videos.insert(video.id, video);
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_login_identifier(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let needle = identifier.trim().to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == needle || u.email == needle)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if state.identity_taken(&new_user.username, &new_user.email, None) {
            return Err(AppError::duplicate("User with email or username already exists"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            full_name: new_user.full_name,
            avatar: new_user.avatar,
            cover_image: new_user.cover_image,
            password_hash: new_user.password_hash,
            refresh_token_hash: None,
            watch_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn persist_refresh_token(
        &self,
        id: Uuid,
        fingerprint: Option<&str>,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.refresh_token_hash = fingerprint.map(str::to_string);
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        if user.refresh_token_hash.as_deref() != Some(expected) {
            return Ok(false);
        }
        user.refresh_token_hash = Some(next.to_string());
        Ok(true)
    }

    async fn replace_password(
        &self,
        id: Uuid,
        password_hash: &str,
        revoke_session: bool,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.password_hash = password_hash.to_string();
        if revoke_session {
            user.refresh_token_hash = None;
        }
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        let email_taken = state
            .users
            .values()
            .any(|u| u.id != id && u.email == email);
        if email_taken {
            return Err(AppError::duplicate("User with this email already exists"));
        }
        let user = state.user_mut(id)?;
        user.full_name = full_name.to_string();
        user.email = email.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.avatar = url.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.cover_image = Some(url.to_string());
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Uuid,
    ) -> Result<Option<ChannelProfile>, AppError> {
        let needle = username.trim().to_lowercase();
        let state = self.state.read().await;
        let Some(channel) = state.users.values().find(|u| u.username == needle) else {
            return Ok(None);
        };

        let subscribers_count = state
            .subscriptions
            .iter()
            .filter(|(_, ch)| *ch == channel.id)
            .count() as i64;
        let channels_subscribed_to_count = state
            .subscriptions
            .iter()
            .filter(|(sub, _)| *sub == channel.id)
            .count() as i64;

        Ok(Some(ChannelProfile {
            id: channel.id,
            username: channel.username.clone(),
            full_name: channel.full_name.clone(),
            email: channel.email.clone(),
            avatar: channel.avatar.clone(),
            cover_image: channel.cover_image.clone(),
            subscribers_count,
            channels_subscribed_to_count,
            is_subscribed: state.subscriptions.contains(&(viewer_id, channel.id)),
        }))
    }

    async fn toggle_subscription(
        &self,
        subscriber_id: Uuid,
        channel_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&channel_id) {
            return Err(AppError::not_found("Channel does not exist"));
        }
        let key = (subscriber_id, channel_id);
        if state.subscriptions.remove(&key) {
            return Ok(false);
        }
        state.subscriptions.insert(key);
        Ok(true)
    }

    async fn record_watch(&self, user_id: Uuid, video_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.videos.contains_key(&video_id) {
            return Err(AppError::not_found("Video does not exist"));
        }
        let user = state.user_mut(user_id)?;
        user.watch_history.push(video_id);
        Ok(())
    }

    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, AppError> {
        let state = self.state.read().await;
        let user = state.users.get(&user_id).ok_or_else(user_not_found)?;

        let history = user
            .watch_history
            .iter()
            .filter_map(|video_id| state.videos.get(video_id))
            .filter_map(|video| {
                let owner = state.users.get(&video.owner_id)?;
                Some(WatchedVideo {
                    id: video.id,
                    title: video.title.clone(),
                    video_file: video.video_file.clone(),
                    thumbnail: video.thumbnail.clone(),
                    duration: video.duration,
                    owner: VideoOwner {
                        username: owner.username.clone(),
                        full_name: owner.full_name.clone(),
                        avatar: owner.avatar.clone(),
                    },
                })
            })
            .collect();
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Arc;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Test User".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            avatar: "https://media.local/avatar.png".to_string(),
            cover_image: None,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_username_or_email() {
        let store = InMemoryUserStore::new();
        store.create(new_user("alice", "a@x.com")).await.unwrap();

        let err = store.create(new_user("alice", "other@x.com")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateIdentity);
        let err = store.create(new_user("bob", "a@x.com")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateIdentity);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn lookup_by_username_or_email_is_case_insensitive() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("alice", "a@x.com")).await.unwrap();

        let by_name = store.find_by_login_identifier("ALICE").await.unwrap().unwrap();
        let by_email = store.find_by_login_identifier("A@X.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_email.id, user.id);
        assert!(store.find_by_login_identifier("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rotation_is_compare_and_swap() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("alice", "a@x.com")).await.unwrap();
        store.persist_refresh_token(user.id, Some("fp-1")).await.unwrap();

        assert!(store.rotate_refresh_token(user.id, "fp-1", "fp-2").await.unwrap());
        assert!(!store.rotate_refresh_token(user.id, "fp-1", "fp-3").await.unwrap());

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("fp-2"));
    }

    #[tokio::test]
    async fn concurrent_rotation_has_single_winner() {
        let store = Arc::new(InMemoryUserStore::new());
        let user = store.create(new_user("alice", "a@x.com")).await.unwrap();
        store.persist_refresh_token(user.id, Some("stale")).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .rotate_refresh_token(user.id, "stale", &format!("next-{}", i))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn replace_password_optionally_clears_session() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("alice", "a@x.com")).await.unwrap();
        store.persist_refresh_token(user.id, Some("fp-1")).await.unwrap();

        store.replace_password(user.id, "$2b$04$second", false).await.unwrap();
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$2b$04$second");
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("fp-1"));

        store.replace_password(user.id, "$2b$04$third", true).await.unwrap();
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$2b$04$third");
        assert!(stored.refresh_token_hash.is_none());

        let err = store.replace_password(Uuid::new_v4(), "x", true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn subscriptions_toggle_and_count() {
        let store = InMemoryUserStore::new();
        let alice = store.create(new_user("alice", "a@x.com")).await.unwrap();
        let bob = store.create(new_user("bob", "b@x.com")).await.unwrap();

        assert!(store.toggle_subscription(bob.id, alice.id).await.unwrap());
        let profile = store.channel_profile("alice", bob.id).await.unwrap().unwrap();
        assert_eq!(profile.subscribers_count, 1);
        assert_eq!(profile.channels_subscribed_to_count, 0);
        assert!(profile.is_subscribed);

        assert!(!store.toggle_subscription(bob.id, alice.id).await.unwrap());
        let profile = store.channel_profile("alice", bob.id).await.unwrap().unwrap();
        assert_eq!(profile.subscribers_count, 0);
        assert!(!profile.is_subscribed);
    }

    #[tokio::test]
    async fn watch_history_keeps_order_and_owner() {
        let store = InMemoryUserStore::new();
        let alice = store.create(new_user("alice", "a@x.com")).await.unwrap();
        let bob = store.create(new_user("bob", "b@x.com")).await.unwrap();

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        for (id, title) in [(first, "first"), (second, "second")] {
            store
                .insert_video(Video {
                    id,
                    owner_id: bob.id,
                    title: title.to_string(),
                    video_file: format!("https://media.local/{}.mp4", title),
                    thumbnail: format!("https://media.local/{}.png", title),
                    duration: 12.5,
                    created_at: Utc::now(),
                })
                .await;
        }

        store.record_watch(alice.id, second).await.unwrap();
        store.record_watch(alice.id, first).await.unwrap();
        let err = store.record_watch(alice.id, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let history = store.watch_history(alice.id).await.unwrap();
        let titles: Vec<_> = history.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert_eq!(history[0].owner.username, "bob");
    }
}
