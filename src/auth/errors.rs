//! # Auth Errors
//!
//! Error types for the authentication module.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and authorization errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No bearer token on the request
    #[error("Authentication required")]
    AuthenticationRequired,

    /// JWT token is malformed
    #[error("Malformed token")]
    MalformedToken,

    /// JWT token has expired
    #[error("Token expired")]
    TokenExpired,

    /// JWT signature is invalid
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Authenticated, but the role does not allow the operation
    #[error("Not authorized to access this resource")]
    Forbidden,

    /// Username was empty
    #[error("Invalid username")]
    InvalidUsername,

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MalformedToken | AuthError::InvalidUsername => 400,

            AuthError::AuthenticationRequired
            | AuthError::TokenExpired
            | AuthError::InvalidSignature => 401,

            AuthError::Forbidden => 403,

            AuthError::TokenGenerationFailed => 500,
        }
    }

    /// Machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AuthenticationRequired => "auth_required",
            AuthError::MalformedToken => "malformed_token",
            AuthError::TokenExpired => "auth_expired",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Forbidden => "forbidden",
            AuthError::InvalidUsername => "invalid_username",
            AuthError::TokenGenerationFailed => "token_generation_failed",
        }
    }
}
