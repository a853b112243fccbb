/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. Access tokens carry the
/// user's profile claims; refresh tokens carry only the subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::store::User;

/// Which secret and lifetime a token was issued under
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Identity a token is minted for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl From<&User> for TokenSubject {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub kind: TokenKind,
    /// Random token id; keeps two tokens minted in the same second distinct
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(
        subject: &TokenSubject,
        kind: TokenKind,
        jti: String,
        now: DateTime<Utc>,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let issued_at = now.timestamp();
        let (username, email, full_name) = match kind {
            TokenKind::Access => (
                Some(subject.username.clone()),
                Some(subject.email.clone()),
                Some(subject.full_name.clone()),
            ),
            TokenKind::Refresh => (None, None, None),
        };
        Self {
            sub: subject.id.to_string(),
            username,
            email,
            full_name,
            kind,
            jti,
            iat: issued_at,
            exp: issued_at.saturating_add(expiry_seconds),
            iss: issuer,
        }
    }

    /// Extract user ID from claims
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenMalformed)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}
