/// Refresh token fingerprinting
///
/// The server never stores a raw refresh token. It stores the SHA-256
/// fingerprint of the most recently issued one and compares fingerprints.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

const TOKEN_ID_LENGTH: usize = 32;

/// Random alphanumeric id embedded as the `jti` claim
pub fn generate_token_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Hex SHA-256 of a token, as persisted on the user record
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
