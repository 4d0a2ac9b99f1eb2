//! Cache key constants and builders
//!
//! Standardized key naming for all cached entities, keeping the pricing
//! layer's keys from colliding with anything else sharing the instance.
//!
//! # Key Patterns
//!
//! - `rate:{country_code}` - cached wholesale price rows
//! - `markup:config` - the markup configuration singleton
//! - `account:{account_id}` - cached account rows

/// Prefix for cached country price rows
pub const RATE_KEY_PREFIX: &str = "rate";

/// Key for the markup configuration singleton
pub const MARKUP_CONFIG_KEY: &str = "markup:config";

/// Prefix for cached account rows
pub const ACCOUNT_PREFIX: &str = "account";

/// TTL for country price rows (10 minutes; prices change via import or
/// admin edit, both infrequent)
pub const RATE_TTL_SECS: u64 = 600;

/// TTL for the markup config (60 seconds). This is the bounded staleness
/// window within which admin markup edits become visible to pricing.
pub const MARKUP_TTL_SECS: u64 = 60;

/// TTL for account rows (5 minutes)
pub const ACCOUNT_TTL_SECS: u64 = 300;

/// Build a cache key for a country price row
///
/// ```
/// use vona_cache::keys::rate_key;
///
/// assert_eq!(rate_key("PE"), "rate:PE");
/// ```
pub fn rate_key(country_code: &str) -> String {
    format!("{}:{}", RATE_KEY_PREFIX, country_code)
}

/// Build a cache key for an account row
///
/// ```
/// use vona_cache::keys::account_key;
///
/// assert_eq!(account_key("uid-1"), "account:uid-1");
/// ```
pub fn account_key(account_id: &str) -> String {
    format!("{}:{}", ACCOUNT_PREFIX, account_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_key() {
        assert_eq!(rate_key("US"), "rate:US");
        assert_eq!(rate_key("GB"), "rate:GB");
    }

    #[test]
    fn test_account_key() {
        assert_eq!(account_key("firebase-uid"), "account:firebase-uid");
    }

    #[test]
    fn test_key_uniqueness() {
        let keys = [
            rate_key("US"),
            account_key("US"),
            MARKUP_CONFIG_KEY.to_string(),
        ];
        let unique = keys.iter().collect::<std::collections::HashSet<_>>();
        assert_eq!(unique.len(), keys.len());
    }
}
