/// Input validators for account fields
///
/// Every validator trims its input, enforces length limits and returns the
/// normalized value on success.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MAX_FULL_NAME_LENGTH: usize = 256;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9_.]+$").unwrap();
}

/// Rejects empty and whitespace-only input, returning the trimmed value
pub fn require_non_blank(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Validates an email address and lowercases it
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = require_non_blank("email", email)?;

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(&trimmed) || trimmed.contains('\0') {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a username; usernames are case-normalized to lowercase
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let normalized = require_non_blank("username", username)?.to_lowercase();

    if normalized.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort("username".to_string(), MIN_USERNAME_LENGTH));
    }

    if normalized.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username".to_string(), MAX_USERNAME_LENGTH));
    }

    if !USERNAME_REGEX.is_match(&normalized) {
        return Err(ValidationError::InvalidFormat("username".to_string()));
    }

    Ok(normalized)
}

/// Validates a display name
pub fn is_valid_full_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = require_non_blank("fullName", name)?;

    if trimmed.len() > MAX_FULL_NAME_LENGTH {
        return Err(ValidationError::TooLong("fullName".to_string(), MAX_FULL_NAME_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("fullName".to_string()));
    }

    Ok(trimmed)
}
