/// Authentication module
///
/// Token issuance and validation, password hashing, refresh-token
/// fingerprinting and the session lifecycle built on top of them.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod session;
mod validator;

pub use claims::{Claims, TokenKind, TokenSubject};
pub use jwt::{TokenIssuer, TokenPair, TokenVerifier};
pub use password::{
    hash_off_thread, validate_password_input, BcryptHasher, PasswordHasher,
};
pub use refresh_token::fingerprint;
pub use session::{LoginOutcome, SessionManager};
pub use validator::{select_token, AuthenticatedUser, SessionValidator};
