/// Session lifecycle
///
/// Login, refresh, logout and password change. A refresh token is only
/// honoured while its fingerprint equals the one stored on the user; every
/// successful refresh swaps that fingerprint, so a superseded token fails.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::claims::{TokenKind, TokenSubject};
use crate::auth::jwt::{TokenIssuer, TokenPair, TokenVerifier};
use crate::auth::password::{
    hash_off_thread, validate_password_input, verify_off_thread, PasswordHasher,
    MAX_PASSWORD_BYTES,
};
use crate::auth::refresh_token::fingerprint;
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::store::{SanitizedUser, User, UserStore};

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: SanitizedUser,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    revoke_on_password_change: bool,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        issuer: TokenIssuer,
        verifier: TokenVerifier,
        revoke_on_password_change: bool,
    ) -> Self {
        Self {
            store,
            hasher,
            issuer,
            verifier,
            revoke_on_password_change,
        }
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AppError::invalid("username or email is required"));
        }

        let user = self
            .store
            .find_by_login_identifier(identifier)
            .await?
            .ok_or_else(|| AppError::not_found("User does not exist"))?;

        if !self.password_matches(password, &user).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.start_session(&user).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome {
            tokens,
            user: SanitizedUser::from(user),
        })
    }

    /// Exchanges a refresh token for a fresh pair and rotates the stored
    /// fingerprint. Two callers racing on the same token get one success.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<TokenPair, AppError> {
        let presented = presented
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.verifier.validate(presented, TokenKind::Refresh)?;
        let user = self
            .store
            .find_by_id(claims.user_id()?)
            .await?
            .ok_or(AuthError::IdentityNotFound)?;

        let expected = fingerprint(presented);
        if user.refresh_token_hash.as_deref() != Some(expected.as_str()) {
            tracing::warn!(user_id = %user.id, "Refresh token does not match stored session");
            return Err(AuthError::SessionRevoked.into());
        }

        let tokens = self.issuer.issue_pair(&TokenSubject::from(&user))?;
        let rotated = self
            .store
            .rotate_refresh_token(user.id, &expected, &fingerprint(&tokens.refresh_token))
            .await?;
        if !rotated {
            tracing::warn!(user_id = %user.id, "Lost refresh rotation race");
            return Err(AuthError::SessionRevoked.into());
        }

        tracing::info!(user_id = %user.id, "Session refreshed");
        Ok(tokens)
    }

    /// Clears the stored refresh token. Calling it again is a no-op.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store
            .persist_refresh_token(user_id, None)
            .await
            .map_err(|e| {
                ErrorContext::new("logout")
                    .with_user_id(user_id.to_string())
                    .log_error(&e);
                e
            })?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if old_password.is_empty() {
            return Err(ValidationError::EmptyField("oldPassword".to_string()).into());
        }
        validate_password_input("newPassword", new_password)?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User does not exist"))?;

        if !self.password_matches(old_password, &user).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let digest = hash_off_thread(self.hasher.clone(), new_password.to_string()).await?;
        self.store
            .replace_password(user_id, &digest, self.revoke_on_password_change)
            .await?;

        if self.revoke_on_password_change {
            tracing::info!(user_id = %user_id, "Password changed, session revoked");
        } else {
            tracing::info!(user_id = %user_id, "Password changed");
        }
        Ok(())
    }

    /// Empty input and input past bcrypt's 72-byte window never match
    async fn password_matches(&self, password: &str, user: &User) -> Result<bool, AppError> {
        if password.is_empty() || password.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        verify_off_thread(
            self.hasher.clone(),
            password.to_string(),
            user.password_hash.clone(),
        )
        .await
    }

    async fn start_session(&self, user: &User) -> Result<TokenPair, AppError> {
        let tokens = self.issuer.issue_pair(&TokenSubject::from(user))?;
        self.store
            .persist_refresh_token(user.id, Some(&fingerprint(&tokens.refresh_token)))
            .await?;
        Ok(tokens)
    }
}
