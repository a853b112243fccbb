use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    user_not_found, ChannelProfile, NewUser, User, UserStore, VideoOwner, WatchedVideo,
};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, password_hash, \
                            refresh_token_hash, watch_history, created_at, updated_at";

/// Postgres-backed user store. Uniqueness and refresh-token rotation rely on
/// single-statement row atomicity.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WatchedVideoRow {
    id: Uuid,
    title: String,
    video_file: String,
    thumbnail: String,
    duration: f64,
    owner_username: String,
    owner_full_name: String,
    owner_avatar: String,
}

impl From<WatchedVideoRow> for WatchedVideo {
    fn from(row: WatchedVideoRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            video_file: row.video_file,
            thumbnail: row.thumbnail,
            duration: row.duration,
            owner: VideoOwner {
                username: row.owner_username,
                full_name: row.owner_full_name,
                avatar: row.owner_avatar,
            },
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_login_identifier(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let needle = identifier.trim().to_lowercase();
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $1 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(&needle)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(&new_user.avatar)
        .bind(&new_user.cover_image)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn persist_refresh_token(
        &self,
        id: Uuid,
        fingerprint: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET refresh_token_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(fingerprint)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(user_not_found());
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3 WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn replace_password(
        &self,
        id: Uuid,
        password_hash: &str,
        revoke_session: bool,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                refresh_token_hash = CASE WHEN $3 THEN NULL ELSE refresh_token_hash END,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(revoke_session)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(user_not_found());
        }
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET full_name = $2, email = $3, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(user_not_found)
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(user_not_found)
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET cover_image = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(user_not_found)
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Uuid,
    ) -> Result<Option<ChannelProfile>, AppError> {
        let profile = sqlx::query_as::<_, ChannelProfile>(
            r#"
            SELECT u.id, u.username, u.full_name, u.email, u.avatar, u.cover_image,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)
                       AS subscribers_count,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id)
                       AS channels_subscribed_to_count,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                       WHERE s.channel_id = u.id AND s.subscriber_id = $2
                   ) AS is_subscribed
            FROM users u
            WHERE u.username = $1
            "#,
        )
        .bind(username.trim().to_lowercase())
        .bind(viewer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn toggle_subscription(
        &self,
        subscriber_id: Uuid,
        channel_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let channel_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(channel_id)
                .fetch_one(&mut tx)
                .await?;
        if !channel_exists {
            return Err(AppError::not_found("Channel does not exist"));
        }

        let removed = sqlx::query(
            "DELETE FROM subscriptions WHERE subscriber_id = $1 AND channel_id = $2",
        )
        .bind(subscriber_id)
        .bind(channel_id)
        .execute(&mut tx)
        .await?
        .rows_affected();

        if removed == 0 {
            sqlx::query(
                r#"
                INSERT INTO subscriptions (id, subscriber_id, channel_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (subscriber_id, channel_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(subscriber_id)
            .bind(channel_id)
            .execute(&mut tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed == 0)
    }

    async fn record_watch(&self, user_id: Uuid, video_id: Uuid) -> Result<(), AppError> {
        let video_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM videos WHERE id = $1)")
                .bind(video_id)
                .fetch_one(&self.pool)
                .await?;
        if !video_exists {
            return Err(AppError::not_found("Video does not exist"));
        }

        let result = sqlx::query(
            "UPDATE users SET watch_history = array_append(watch_history, $2) WHERE id = $1",
        )
        .bind(user_id)
        .bind(video_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(user_not_found());
        }
        Ok(())
    }

    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, AppError> {
        let rows = sqlx::query_as::<_, WatchedVideoRow>(
            r#"
            SELECT v.id, v.title, v.video_file, v.thumbnail, v.duration,
                   o.username AS owner_username,
                   o.full_name AS owner_full_name,
                   o.avatar AS owner_avatar
            FROM users u
            CROSS JOIN LATERAL unnest(u.watch_history) WITH ORDINALITY AS h(video_id, position)
            JOIN videos v ON v.id = h.video_id
            JOIN users o ON o.id = v.owner_id
            WHERE u.id = $1
            ORDER BY h.position
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(WatchedVideo::from).collect())
    }
}
