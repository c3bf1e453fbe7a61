pub mod jwt;
pub mod password;

use thiserror::Error;

pub use jwt::{Claims, JwtWrapper, ValidatedToken};
pub use password::{hash_password, verify_password};

/// Token issuance, validation and role failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Absent authorization token")]
    AbsentToken,

    // Detail is for logs; clients only see "Invalid token"
    #[error("Invalid token")]
    InvalidToken(String),

    #[error("Expired token")]
    ExpiredToken,

    #[error("Insufficient privileges - role '{required}' required")]
    InsufficientPrivileges { required: String },

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("You only can refresh the token {window_minutes} minutes before expire")]
    RefreshTooEarly { window_minutes: i64 },

    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("JWT generation error: {0}")]
    Signing(String),
}
