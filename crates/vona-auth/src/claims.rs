//! Bearer token claims
//!
//! The claims carried by tokens the identity provider issues to the web
//! client. The subject is the provider's user id, which is also the
//! account id in the database.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Claims in a provider-issued bearer token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject: the identity provider's user id
    pub sub: String,

    /// Email, when the provider includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        self.exp < Utc::now().timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_check() {
        let now = Utc::now().timestamp();

        let live = Claims {
            sub: "uid-1".to_string(),
            email: None,
            iat: now,
            exp: now + 3600,
        };
        assert!(!live.is_expired());

        let stale = Claims {
            sub: "uid-1".to_string(),
            email: None,
            iat: now - 7200,
            exp: now - 3600,
        };
        assert!(stale.is_expired());
    }
}
