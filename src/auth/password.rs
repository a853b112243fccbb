/// Password Hashing and Verification
///
/// One-way salted hashing with bcrypt behind the `PasswordHasher` seam.

use std::sync::Arc;

use bcrypt::{hash, verify};

use crate::error::{AppError, ValidationError};

/// bcrypt only reads the first 72 bytes of its input
pub const MAX_PASSWORD_BYTES: usize = 72;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String, AppError>;
    fn verify(&self, plain: &str, digest: &str) -> Result<bool, AppError>;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plain: &str) -> Result<String, AppError> {
        hash(plain, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    fn verify(&self, plain: &str, digest: &str) -> Result<bool, AppError> {
        verify(plain, digest)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }
}

/// Hashes on the blocking pool; bcrypt is CPU-bound
pub async fn hash_off_thread(
    hasher: Arc<dyn PasswordHasher>,
    plain: String,
) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hasher.hash(&plain))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

pub async fn verify_off_thread(
    hasher: Arc<dyn PasswordHasher>,
    plain: String,
    digest: String,
) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || hasher.verify(&plain, &digest))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
}

/// Rejects blank passwords and inputs longer than `MAX_PASSWORD_BYTES`
pub fn validate_password_input(field: &str, password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong(field.to_string(), MAX_PASSWORD_BYTES));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> BcryptHasher {
        BcryptHasher::new(4)
    }

    #[test]
    fn test_hash_password() {
        let password = "p1";
        let digest = hasher().hash(password).expect("Failed to hash password");

        assert_ne!(password, digest);
        assert!(digest.starts_with("$2"));
    }

    #[test]
    fn test_hash_is_salted() {
        let first = hasher().hash("same").unwrap();
        let second = hasher().hash("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password() {
        let digest = hasher().hash("ValidPassword123").unwrap();
        assert!(hasher().verify("ValidPassword123", &digest).unwrap());
        assert!(!hasher().verify("WrongPassword123", &digest).unwrap());
    }

    #[test]
    fn test_verify_errors_on_malformed_hash() {
        assert!(hasher().verify("anything", "not-a-valid-hash").is_err());
    }

    #[tokio::test]
    async fn test_off_thread_round_trip() {
        let shared: Arc<dyn PasswordHasher> = Arc::new(hasher());
        let digest = hash_off_thread(shared.clone(), "p1".to_string()).await.unwrap();
        assert!(verify_off_thread(shared, "p1".to_string(), digest).await.unwrap());
    }

    #[test]
    fn test_password_input_rules() {
        assert!(validate_password_input("password", "p1").is_ok());
        assert!(validate_password_input("password", "   ").is_err());
        assert!(validate_password_input("password", &"a".repeat(72)).is_ok());
        assert!(matches!(
            validate_password_input("password", &"a".repeat(73)),
            Err(ValidationError::TooLong(_, 72))
        ));
    }

    #[test]
    fn test_length_cap_counts_bytes() {
        // 37 two-byte characters: 37 chars, 74 bytes
        let password = "é".repeat(37);
        assert!(validate_password_input("password", &password).is_err());
    }
}
