//! Account model
//!
//! Represents a prepaid user account. Accounts are keyed by the identity
//! provider's subject id and are created at first authentication with a
//! zero balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account entity
///
/// Balance is USD and must never go negative: settlement deducts at most
/// the available balance, deposits and admin overrides validate before
/// writing. All mutations happen inside database transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Identity provider subject id
    pub id: String,

    /// Email from the identity provider, if known
    pub email: Option<String>,

    /// Current prepaid balance
    pub balance: Decimal,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Whether the account may use the admin surface
    pub is_admin: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a fresh account for a newly-seen subject
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email,
            balance: Decimal::ZERO,
            currency: "USD".to_string(),
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account has any spendable balance
    #[inline]
    pub fn has_funds(&self) -> bool {
        self.balance > Decimal::ZERO
    }

    /// Amount actually collectible for a charge: the full cost when funds
    /// suffice, otherwise whatever balance remains (never negative).
    pub fn collectible(&self, cost: Decimal) -> Decimal {
        cost.min(self.balance).max(Decimal::ZERO)
    }

    /// Check if a charge would be collected in full
    pub fn covers(&self, cost: Decimal) -> bool {
        self.balance >= cost
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new("", None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_account_starts_empty() {
        let account = Account::new("firebase-uid-1", Some("user@example.com".to_string()));
        assert_eq!(account.balance, Decimal::ZERO);
        assert!(!account.is_admin);
        assert!(!account.has_funds());
    }

    #[test]
    fn test_collectible_caps_at_balance() {
        let account = Account {
            balance: dec!(0.03),
            ..Default::default()
        };

        assert_eq!(account.collectible(dec!(0.05)), dec!(0.03));
        assert_eq!(account.collectible(dec!(0.02)), dec!(0.02));
        assert!(!account.covers(dec!(0.05)));
        assert!(account.covers(dec!(0.03)));
    }

    #[test]
    fn test_collectible_never_negative() {
        let account = Account {
            balance: Decimal::ZERO,
            ..Default::default()
        };

        assert_eq!(account.collectible(dec!(1.00)), Decimal::ZERO);
        assert_eq!(account.collectible(Decimal::ZERO), Decimal::ZERO);
    }
}
