//! Balance transaction model
//!
//! Immutable append-only ledger of balance changes. The account balance is a
//! cached aggregate that must always be reconcilable by summing these rows
//! from account creation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Charge for a settled call (negative amount)
    Call,
    /// Payment-confirmed deposit (positive amount)
    Deposit,
    /// Administrative balance override delta
    Adjustment,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Call => write!(f, "call"),
            TransactionType::Deposit => write!(f, "deposit"),
            TransactionType::Adjustment => write!(f, "adjustment"),
        }
    }
}

impl TransactionType {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "call" => Some(TransactionType::Call),
            "deposit" => Some(TransactionType::Deposit),
            "adjustment" => Some(TransactionType::Adjustment),
            _ => None,
        }
    }
}

/// Ledger entry, never mutated after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique identifier
    pub id: i64,

    /// Owning account id
    pub account_id: String,

    /// Type of transaction
    pub transaction_type: TransactionType,

    /// Signed amount (negative for charges)
    pub amount: Decimal,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Processing status
    pub status: String,

    /// What produced this entry (settlement, payment, admin)
    pub source: Option<String>,

    /// Linked call SID for call charges
    pub call_sid: Option<String>,

    /// External payment-session id for deposits (idempotency key)
    pub external_ref: Option<String>,

    /// Balance after this entry was applied
    pub balance_after: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Build a call-charge entry
    pub fn call_charge(
        account_id: impl Into<String>,
        deduction: Decimal,
        balance_after: Decimal,
        call_sid: impl Into<String>,
    ) -> Self {
        Self {
            transaction_type: TransactionType::Call,
            amount: -deduction,
            call_sid: Some(call_sid.into()),
            source: Some("settlement".to_string()),
            balance_after,
            ..Self::base(account_id)
        }
    }

    /// Build a deposit entry
    pub fn deposit(
        account_id: impl Into<String>,
        amount: Decimal,
        balance_after: Decimal,
        external_ref: impl Into<String>,
    ) -> Self {
        Self {
            transaction_type: TransactionType::Deposit,
            amount,
            external_ref: Some(external_ref.into()),
            source: Some("payment".to_string()),
            balance_after,
            ..Self::base(account_id)
        }
    }

    /// Build an adjustment entry for an admin absolute-set of the balance
    pub fn adjustment(
        account_id: impl Into<String>,
        delta: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self {
            transaction_type: TransactionType::Adjustment,
            amount: delta,
            source: Some("admin".to_string()),
            balance_after,
            ..Self::base(account_id)
        }
    }

    fn base(account_id: impl Into<String>) -> Self {
        Self {
            id: 0,
            account_id: account_id.into(),
            transaction_type: TransactionType::Adjustment,
            amount: Decimal::ZERO,
            currency: "USD".to_string(),
            status: "completed".to_string(),
            source: None,
            call_sid: None,
            external_ref: None,
            balance_after: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Check if this entry reduces the balance
    pub fn is_charge(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_call_charge_is_negative() {
        let entry = TransactionRecord::call_charge("u1", dec!(0.45), dec!(0.55), "CA123");
        assert_eq!(entry.amount, dec!(-0.45));
        assert_eq!(entry.transaction_type, TransactionType::Call);
        assert_eq!(entry.call_sid.as_deref(), Some("CA123"));
        assert!(entry.is_charge());
    }

    #[test]
    fn test_deposit_carries_session_ref() {
        let entry = TransactionRecord::deposit("u1", dec!(10.00), dec!(10.55), "cs_abc");
        assert_eq!(entry.amount, dec!(10.00));
        assert_eq!(entry.external_ref.as_deref(), Some("cs_abc"));
        assert!(!entry.is_charge());
    }

    #[test]
    fn test_adjustment_keeps_signed_delta() {
        let entry = TransactionRecord::adjustment("u1", dec!(-2.50), dec!(7.50));
        assert_eq!(entry.amount, dec!(-2.50));
        assert_eq!(entry.transaction_type, TransactionType::Adjustment);
    }

    #[test]
    fn test_type_round_trip() {
        for ty in [
            TransactionType::Call,
            TransactionType::Deposit,
            TransactionType::Adjustment,
        ] {
            assert_eq!(TransactionType::from_str(&ty.to_string()), Some(ty));
        }
    }
}
