//! Account, ledger and call-history DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use vona_core::models::{Account, CallRecord, TransactionRecord};

/// Account as exposed to its owner
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    /// Account id (identity provider subject)
    pub id: String,
    /// Email when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Current prepaid balance
    pub balance: Decimal,
    /// Currency code
    pub currency: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            balance: account.balance,
            currency: account.currency,
            created_at: account.created_at,
        }
    }
}

/// Ledger entry as exposed to the account owner
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub transaction_type: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionRecord> for TransactionResponse {
    fn from(entry: TransactionRecord) -> Self {
        Self {
            id: entry.id,
            transaction_type: entry.transaction_type.to_string(),
            amount: entry.amount,
            currency: entry.currency,
            call_sid: entry.call_sid,
            balance_after: entry.balance_after,
            created_at: entry.created_at,
        }
    }
}

/// Call-history entry as exposed to the account owner
#[derive(Debug, Clone, Serialize)]
pub struct CallResponse {
    pub id: i64,
    pub call_sid: String,
    pub phone_number: String,
    pub direction: String,
    pub status: String,
    pub duration_secs: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<CallRecord> for CallResponse {
    fn from(record: CallRecord) -> Self {
        Self {
            id: record.id,
            call_sid: record.call_sid,
            phone_number: record.phone_number,
            direction: record.direction.to_string(),
            status: record.status.to_string(),
            duration_secs: record.duration_secs,
            cost: record.cost,
            created_at: record.created_at,
        }
    }
}

/// Admin absolute balance set
///
/// PUT /api/v1/admin/accounts/{id}/balance
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BalanceUpdateRequest {
    /// The new balance; must be non-negative
    #[validate(custom(function = "validate_non_negative"))]
    pub balance: Decimal,
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("range").with_message("must be non-negative".into()));
    }
    Ok(())
}

fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("range").with_message("must be positive".into()));
    }
    Ok(())
}

/// Payment-confirmed deposit relay
///
/// POST /api/v1/admin/accounts/{id}/deposits
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DepositRequest {
    /// Amount to credit; must be positive
    #[validate(custom(function = "validate_positive"))]
    pub amount: Decimal,

    /// External payment-session id (idempotency key)
    #[validate(length(min = 1, max = 128, message = "session_id is required"))]
    pub session_id: String,
}
