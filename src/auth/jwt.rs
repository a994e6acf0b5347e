//! # JWT Session Tokens
//!
//! HS256 tokens carrying the reviewer identity and role.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::errors::{AuthError, AuthResult};
use super::role::{normalize_role, Role};

/// JWT claims for reviewer sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerClaims {
    /// Subject (username)
    pub sub: String,

    pub role: Role,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing (256-bit minimum recommended)
    pub secret: String,

    /// Session lifetime
    pub token_ttl: Duration,

    /// Issuer identifier
    pub issuer: String,

    /// Audience identifier
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string(),
            token_ttl: Duration::hours(8),
            issuer: "reviewdesk".to_string(),
            audience: "reviewdesk".to_string(),
        }
    }
}

/// Identity extracted from a valid token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewer {
    pub username: String,
    pub role: Role,
}

impl Reviewer {
    /// Fail with [`AuthError::Forbidden`] unless the reviewer is an admin
    pub fn require_admin(&self) -> AuthResult<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Issues and checks session tokens
#[derive(Clone)]
pub struct Authenticator {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Authenticator {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue a token valid from now
    pub fn issue(&self, username: &str, role: &str) -> AuthResult<String> {
        self.issue_at(username, role, Utc::now())
    }

    /// Issue a token as if signed at `issued_at`
    pub fn issue_at(
        &self,
        username: &str,
        role: &str,
        issued_at: DateTime<Utc>,
    ) -> AuthResult<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidUsername);
        }

        let claims = ReviewerClaims {
            sub: username.to_string(),
            role: normalize_role(username, role),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.config.token_ttl).timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    /// Validate a token and return the reviewer it names
    pub fn check(&self, token: &str) -> AuthResult<Reviewer> {
        let claims = self.claims(token)?;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::MalformedToken);
        }
        Ok(Reviewer {
            username: claims.sub,
            role: claims.role,
        })
    }

    /// Validate a token and return its raw claims
    pub fn claims(&self, token: &str) -> AuthResult<ReviewerClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = 0;

        let data = decode::<ReviewerClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            let err = match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            };
            debug!(error = %err, "token rejected");
            err
        })?;

        Ok(data.claims)
    }

    pub fn token_ttl(&self) -> Duration {
        self.config.token_ttl
    }
}
