/// Per-request session validation
///
/// Resolves a presented access token to a sanitized user. Access tokens are
/// stateless: only signature, kind and expiry are checked, then the subject
/// is looked up so deleted users cannot keep acting.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::claims::TokenKind;
use crate::auth::jwt::TokenVerifier;
use crate::error::{AppError, AuthError};
use crate::store::{SanitizedUser, UserStore};

/// Identity attached to a request once the access token has been validated
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub user: SanitizedUser,
}

#[derive(Clone)]
pub struct SessionValidator {
    verifier: TokenVerifier,
    store: Arc<dyn UserStore>,
}

impl SessionValidator {
    pub fn new(verifier: TokenVerifier, store: Arc<dyn UserStore>) -> Self {
        Self { verifier, store }
    }

    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthenticatedUser, AppError> {
        self.authenticate_at(token, Utc::now()).await
    }

    pub async fn authenticate_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedUser, AppError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.verifier.validate_at(token, TokenKind::Access, now)?;
        let user_id = claims.user_id()?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::IdentityNotFound)?;

        Ok(AuthenticatedUser {
            id: user.id,
            user: SanitizedUser::from(user),
        })
    }
}

/// Picks the token to validate: a non-empty cookie wins over the
/// `Authorization: Bearer` header.
pub fn select_token(cookie: Option<&str>, authorization: Option<&str>) -> Option<String> {
    if let Some(value) = cookie.map(str::trim).filter(|v| !v.is_empty()) {
        return Some(value.to_string());
    }

    authorization
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
