use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use super::{AuthError, TokenVerifier};

/// HS256 JWT verifier with expiry, optional issuer and audience checks.
pub struct JwtVerifier {
    key: DecodingKey,
    issuer: Option<String>,
    audience: Option<String>,
    leeway_secs: u64,
}

impl JwtVerifier {
    #[must_use]
    pub fn hs256(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            issuer: None,
            audience: None,
            leeway_secs: 30,
        }
    }

    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Clock skew tolerated on `exp`.
    #[must_use]
    pub fn leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = self.leeway_secs;
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss]);
        }
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify_token(&self, token: &str) -> Result<Value, AuthError> {
        let data = jsonwebtoken::decode::<Value>(token, &self.key, &self.validation()).map_err(|e| {
            debug!(error = %e, "JWT rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }
}
