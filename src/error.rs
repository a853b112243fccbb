/// Error Handling Module
///
/// Every session and account operation returns one of the error types below.
/// Domain errors (validation, database, auth, media, config) are unified by
/// `AppError`, which exposes a stable `ErrorKind` and maps itself to an HTTP
/// status and a JSON envelope at the transport edge.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
    /// Free-form message shown to the client verbatim
    Invalid(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is required", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
            ValidationError::Invalid(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for ValidationError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => write!(f, "{}", msg),
            DatabaseError::NotFound(msg) => write!(f, "{}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Authentication and session errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    MissingToken,
    TokenMalformed,
    TokenExpired,
    /// Refresh token does not match the value stored on the user
    SessionRevoked,
    /// Token is well-formed but its subject no longer resolves to a user
    IdentityNotFound,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid user credentials"),
            AuthError::MissingToken => write!(f, "Unauthorized request"),
            AuthError::TokenMalformed => write!(f, "Invalid token"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::SessionRevoked => write!(f, "Refresh token is expired or used"),
            AuthError::IdentityNotFound => write!(f, "Invalid access token"),
        }
    }
}

impl StdError for AuthError {}

/// Media host errors
#[derive(Debug, Clone)]
pub enum MediaError {
    FileMissing(String),
    UploadFailed(String),
    InvalidResponse(String),
    OutsideStagingArea(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::FileMissing(path) => write!(f, "Local file not found: {}", path),
            MediaError::UploadFailed(msg) => write!(f, "Media upload failed: {}", msg),
            MediaError::InvalidResponse(msg) => write!(f, "Media host returned invalid response: {}", msg),
            MediaError::OutsideStagingArea(path) => {
                write!(f, "Refusing to upload file outside the staging directory: {}", path)
            }
        }
    }
}

impl StdError for MediaError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    Media(MediaError),
    Config(ConfigError),
    Internal(String),
}

/// Stable failure taxonomy exposed to callers of the session core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DuplicateIdentity,
    NotFound,
    InvalidCredentials,
    Unauthorized,
    TokenMalformed,
    TokenExpired,
    SessionRevoked,
    IdentityNotFound,
    InternalFailure,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::DuplicateIdentity => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidCredentials
            | ErrorKind::Unauthorized
            | ErrorKind::TokenMalformed
            | ErrorKind::TokenExpired
            | ErrorKind::SessionRevoked
            | ErrorKind::IdentityNotFound => StatusCode::UNAUTHORIZED,
            ErrorKind::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::DuplicateIdentity => "DUPLICATE_IDENTITY",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::TokenMalformed => "TOKEN_MALFORMED",
            ErrorKind::TokenExpired => "TOKEN_EXPIRED",
            ErrorKind::SessionRevoked => "SESSION_REVOKED",
            ErrorKind::IdentityNotFound => "IDENTITY_NOT_FOUND",
            ErrorKind::InternalFailure => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                ErrorKind::DuplicateIdentity
            }
            AppError::Database(DatabaseError::NotFound(_)) => ErrorKind::NotFound,
            AppError::Database(_) => ErrorKind::InternalFailure,
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
                AuthError::MissingToken => ErrorKind::Unauthorized,
                AuthError::TokenMalformed => ErrorKind::TokenMalformed,
                AuthError::TokenExpired => ErrorKind::TokenExpired,
                AuthError::SessionRevoked => ErrorKind::SessionRevoked,
                AuthError::IdentityNotFound => ErrorKind::IdentityNotFound,
            },
            // A media failure surfaces as bad input unless the caller remaps it
            AppError::Media(_) => ErrorKind::Validation,
            AppError::Config(_) | AppError::Internal(_) => ErrorKind::InternalFailure,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::Database(DatabaseError::NotFound(msg.into()))
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        AppError::Database(DatabaseError::UniqueConstraintViolation(msg.into()))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::Validation(ValidationError::Invalid(msg.into()))
    }

    /// Message safe to hand to a client
    fn public_message(&self) -> String {
        match self {
            AppError::Database(DatabaseError::ConnectionPool(_)) => {
                "Database service temporarily unavailable".to_string()
            }
            AppError::Database(DatabaseError::QueryExecution(_))
            | AppError::Database(DatabaseError::UnexpectedError(_)) => {
                "Database error occurred".to_string()
            }
            AppError::Config(_) => "Server configuration error".to_string(),
            AppError::Internal(_) => "Something went wrong".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Media(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        AppError::Media(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => {
                AppError::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                let message = match db_err.constraint() {
                    Some(c) if c.contains("email") => "User with this email already exists",
                    Some(c) if c.contains("username") => "User with this username already exists",
                    _ => "User with email or username already exists",
                };
                AppError::Database(DatabaseError::UniqueConstraintViolation(message.to_string()))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            _ => AppError::Database(DatabaseError::UnexpectedError(err.to_string())),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error envelope returned to HTTP clients
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub data: serde_json::Value,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
    /// Error code for client-side handling
    pub code: String,
    /// Unique error ID for correlating with server logs
    pub error_id: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            status_code: status,
            data: serde_json::Value::Null,
            message,
            success: false,
            errors: Vec::new(),
            code,
            error_id,
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let kind = self.kind();
        let status = match self {
            AppError::Database(DatabaseError::ConnectionPool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => kind.status_code(),
        };
        let response = ErrorResponse::new(
            request_id.to_string(),
            self.public_message(),
            kind.code().to_string(),
            status.as_u16(),
        );
        (status, response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate identity attempt");
            }
            AppError::Database(DatabaseError::NotFound(_)) => {
                tracing::info!(request_id = request_id, error = %self, "Record not found");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(AuthError::SessionRevoked) => {
                tracing::warn!(request_id = request_id, "Stale or replayed refresh token presented");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Media(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Media store error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(DatabaseError::ConnectionPool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => self.kind().status_code(),
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context carried through logging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "user_id": self.user_id,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        match error.kind() {
            ErrorKind::InternalFailure => {
                tracing::error!(error = %error, context = ?context, "Operation failed");
            }
            _ => {
                tracing::warn!(error = %error, context = ?context, "Operation rejected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(AppError::duplicate("taken").kind(), ErrorKind::DuplicateIdentity);
        assert_eq!(AppError::not_found("nope").kind(), ErrorKind::NotFound);
        assert_eq!(
            AppError::from(AuthError::SessionRevoked).kind(),
            ErrorKind::SessionRevoked
        );
        assert_eq!(AppError::from(AuthError::MissingToken).kind(), ErrorKind::Unauthorized);
        assert_eq!(
            AppError::Internal("boom".into()).kind(),
            ErrorKind::InternalFailure
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::Validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::DuplicateIdentity.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::SessionRevoked.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ErrorKind::InternalFailure.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sqlx_row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let err = AppError::Internal("secret detail".to_string());
        let (status, body) = <AppError as ErrorHandler>::error_response(&err, "req-1");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.message.contains("secret detail"));
        assert!(!body.success);
        assert_eq!(body.error_id, "req-1");
    }

    #[test]
    fn test_error_envelope_shape() {
        let (_, body) = <AppError as ErrorHandler>::error_response(
            &AppError::from(AuthError::InvalidCredentials),
            "req-2",
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["statusCode"], 401);
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
        assert_eq!(json["code"], "INVALID_CREDENTIALS");
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("test_operation");
        assert_eq!(ctx.operation, "test_operation");
        assert!(ctx.user_id.is_none());

        let ctx_with_user = ctx.with_user_id("user-123".to_string());
        assert_eq!(ctx_with_user.user_id, Some("user-123".to_string()));
    }
}
