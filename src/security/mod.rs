//! # Security Module
//!
//! Token verification consumed by [`AuthMiddleware`](crate::middleware::AuthMiddleware).
//!
//! The middleware only knows the [`TokenVerifier`] contract: hand it the raw
//! bearer token, get back the verified claims or an [`AuthError`]. The
//! provided [`JwtVerifier`] checks HS256-signed JWTs with `jsonwebtoken`; any
//! other scheme (opaque tokens, introspection, JWKS) plugs in by implementing
//! the trait.
//!
//! ```rust
//! use serde_json::{json, Value};
//! use waypoint::security::{AuthError, TokenVerifier};
//!
//! struct StaticToken;
//!
//! impl TokenVerifier for StaticToken {
//!     fn verify_token(&self, token: &str) -> Result<Value, AuthError> {
//!         if token == "letmein" {
//!             Ok(json!({ "sub": "42" }))
//!         } else {
//!             Err(AuthError::InvalidToken("unknown token".into()))
//!         }
//!     }
//! }
//!
//! assert!(StaticToken.verify_token("letmein").is_ok());
//! ```

mod jwt;

use serde_json::Value;

pub use jwt::JwtVerifier;

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("token expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("missing required claim `{0}`")]
    MissingClaim(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Verifies a bearer token and returns its claims.
pub trait TokenVerifier: Send + Sync {
    /// # Errors
    ///
    /// An [`AuthError`] describing why the token is not acceptable.
    fn verify_token(&self, token: &str) -> Result<Value, AuthError>;
}
