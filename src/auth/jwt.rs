/// JWT Token Generation and Validation
///
/// Access and refresh tokens are HS256 JWTs signed with separate secrets.
/// Expiry is checked against an explicit clock so callers and tests can
/// evaluate a token at any instant.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;

use crate::auth::claims::{Claims, TokenKind, TokenSubject};
use crate::auth::refresh_token::generate_token_id;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Freshly minted credentials handed to a client
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenIssuer {
    access_key: EncodingKey,
    refresh_key: EncodingKey,
    access_expiry: i64,
    refresh_expiry: i64,
    issuer: String,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            access_key: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_key: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_expiry: config.access_token_expiry,
            refresh_expiry: config.refresh_token_expiry,
            issuer: config.issuer.clone(),
        }
    }

    pub fn issue_access_token(&self, subject: &TokenSubject) -> Result<String, AppError> {
        self.issue_access_token_at(subject, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        self.sign(subject, TokenKind::Access, now)
    }

    pub fn issue_refresh_token(&self, subject: &TokenSubject) -> Result<String, AppError> {
        self.issue_refresh_token_at(subject, Utc::now())
    }

    pub fn issue_refresh_token_at(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        self.sign(subject, TokenKind::Refresh, now)
    }

    pub fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.issue_access_token_at(subject, now)?,
            refresh_token: self.issue_refresh_token_at(subject, now)?,
        })
    }

    fn sign(
        &self,
        subject: &TokenSubject,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let (key, expiry) = match kind {
            TokenKind::Access => (&self.access_key, self.access_expiry),
            TokenKind::Refresh => (&self.refresh_key, self.refresh_expiry),
        };
        let claims = Claims::new(
            subject,
            kind,
            generate_token_id(),
            now,
            expiry,
            self.issuer.clone(),
        );

        encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    access_key: DecodingKey,
    refresh_key: DecodingKey,
    issuer: String,
}

impl TokenVerifier {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            access_key: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_key: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            issuer: config.issuer.clone(),
        }
    }

    pub fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        self.validate_at(token, kind, Utc::now())
    }

    /// Verifies signature, issuer and token kind, then checks expiry at `now`
    pub fn validate_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let key = match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation error: {}", e);
                AuthError::TokenMalformed
            })?;

        if claims.kind != kind {
            return Err(AuthError::TokenMalformed);
        }
        if claims.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_token_secret: "access-secret-key-at-least-32-characters".to_string(),
            access_token_expiry: 900,
            refresh_token_secret: "refresh-secret-key-at-least-32-characters".to_string(),
            refresh_token_expiry: 864000,
            issuer: "test".to_string(),
            revoke_on_password_change: false,
        }
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            full_name: "Alice".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = get_test_config();
        let subject = subject();

        let token = TokenIssuer::new(&config)
            .issue_access_token(&subject)
            .expect("Failed to generate token");
        let claims = TokenVerifier::new(&config)
            .validate(&token, TokenKind::Access)
            .expect("Failed to validate token");

        assert_eq!(claims.user_id().unwrap(), subject.id);
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_pair_tokens_differ_and_validate_with_own_secret() {
        let config = get_test_config();
        let pair = TokenIssuer::new(&config).issue_pair(&subject()).unwrap();
        let verifier = TokenVerifier::new(&config);

        assert_ne!(pair.access_token, pair.refresh_token);
        assert!(verifier.validate(&pair.refresh_token, TokenKind::Refresh).is_ok());
        assert_eq!(
            verifier.validate(&pair.access_token, TokenKind::Refresh),
            Err(AuthError::TokenMalformed)
        );
        assert_eq!(
            verifier.validate(&pair.refresh_token, TokenKind::Access),
            Err(AuthError::TokenMalformed)
        );
    }

    #[test]
    fn test_same_second_refresh_tokens_are_distinct() {
        let issuer = TokenIssuer::new(&get_test_config());
        let subject = subject();
        let now = Utc::now();
        let first = issuer.issue_refresh_token_at(&subject, now).unwrap();
        let second = issuer.issue_refresh_token_at(&subject, now).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_expired_token() {
        let config = get_test_config();
        let issued = Utc::now() - chrono::Duration::seconds(config.access_token_expiry + 1);
        let token = TokenIssuer::new(&config)
            .issue_access_token_at(&subject(), issued)
            .unwrap();

        assert_eq!(
            TokenVerifier::new(&config).validate(&token, TokenKind::Access),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_invalid_token() {
        let result = TokenVerifier::new(&get_test_config())
            .validate("invalid.token.here", TokenKind::Access);

        assert_eq!(result, Err(AuthError::TokenMalformed));
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let token = TokenIssuer::new(&config)
            .issue_access_token(&subject())
            .expect("Failed to generate token");

        let tampered = format!("{}X", token);
        let result = TokenVerifier::new(&config).validate(&tampered, TokenKind::Access);

        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = TokenIssuer::new(&config)
            .issue_access_token(&subject())
            .expect("Failed to generate token");

        config.issuer = "wrong-issuer".to_string();
        let result = TokenVerifier::new(&config).validate(&token, TokenKind::Access);

        assert_eq!(result, Err(AuthError::TokenMalformed));
    }
}
