//! Bearer token verification
//!
//! Validates HS256 tokens issued by the external identity provider. Token
//! creation lives with the provider; this service only verifies signatures
//! and expiry and hands back the claims.

use crate::claims::Claims;
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::{debug, warn};
use vona_core::error::AppError;

/// Verifier for provider-issued bearer tokens
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    /// Create a new verifier from the shared provider secret
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Validate a token and extract its claims
    ///
    /// # Errors
    ///
    /// - `AppError::TokenExpired` if the token has expired
    /// - `AppError::InvalidToken` for any other validation failure
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::default();

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            if matches!(
                e.kind(),
                jsonwebtoken::errors::ErrorKind::ExpiredSignature
            ) {
                warn!("Token expired");
                return AppError::TokenExpired;
            }

            warn!(error = %e, "Invalid token");
            AppError::InvalidToken(format!("Token validation failed: {}", e))
        })?;

        let claims = token_data.claims;

        debug!(subject = %claims.sub, "Token validated");

        Ok(claims)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const TEST_SECRET: &str = "test-secret-key-for-token-testing-12345";

    fn issue_token(secret: &str, sub: &str, exp_offset: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            email: Some(format!("{}@example.com", sub)),
            iat: now,
            exp: now + exp_offset,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let verifier = TokenVerifier::new(TEST_SECRET);
        let token = issue_token(TEST_SECRET, "uid-42", 3600);

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, "uid-42");
        assert_eq!(claims.email.as_deref(), Some("uid-42@example.com"));
    }

    #[test]
    fn test_expired_token() {
        let verifier = TokenVerifier::new(TEST_SECRET);
        let token = issue_token(TEST_SECRET, "uid-42", -3600);

        let result = verifier.verify(&token);
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_garbage_token() {
        let verifier = TokenVerifier::new(TEST_SECRET);

        let result = verifier.verify("not.a.token");
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let verifier = TokenVerifier::new("a-different-secret");
        let token = issue_token(TEST_SECRET, "uid-42", 3600);

        let result = verifier.verify(&token);
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_debug_impl_hides_secret() {
        let verifier = TokenVerifier::new(TEST_SECRET);
        let debug_str = format!("{:?}", verifier);

        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains(TEST_SECRET));
    }
}
