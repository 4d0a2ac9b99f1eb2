//! Ledger repository implementation
//!
//! Append-only storage for balance transactions. Rows are never updated or
//! deleted; the partial unique index on (account_id, external_ref) backs
//! deposit idempotency at the storage layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use vona_core::{
    models::{TransactionRecord, TransactionType},
    traits::TransactionRepository,
    AppError, AppResult,
};

/// PostgreSQL implementation of TransactionRepository
pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    /// Create a new transaction repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, account_id, transaction_type, amount, currency, status,
    source, call_sid, external_ref, balance_after, created_at
"#;

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    #[instrument(skip(self, entry), fields(account_id = %entry.account_id))]
    async fn append(&self, entry: &TransactionRecord) -> AppResult<TransactionRecord> {
        debug!(
            "Appending {} transaction of {} for account {}",
            entry.transaction_type, entry.amount, entry.account_id
        );

        let query = format!(
            r#"
            INSERT INTO transactions (
                account_id, transaction_type, amount, currency, status,
                source, call_sid, external_ref, balance_after
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, TransactionRow>(&query)
            .bind(&entry.account_id)
            .bind(entry.transaction_type.to_string())
            .bind(entry.amount)
            .bind(&entry.currency)
            .bind(&entry.status)
            .bind(&entry.source)
            .bind(&entry.call_sid)
            .bind(&entry.external_ref)
            .bind(entry.balance_after)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error appending transaction: {}", e);
                if e.to_string().contains("unique constraint") {
                    AppError::AlreadyExists(format!(
                        "Transaction with external ref {:?} already exists",
                        entry.external_ref
                    ))
                } else {
                    AppError::Database(format!("Failed to append transaction: {}", e))
                }
            })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn list_by_account(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<TransactionRecord>, i64)> {
        debug!(
            "Listing transactions for account {} limit {} offset {}",
            account_id, limit, offset
        );

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error counting transactions: {}", e);
                    AppError::Database(format!("Failed to count transactions: {}", e))
                })?;

        let query = format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            SELECT_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, TransactionRow>(&query)
            .bind(account_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing transactions: {}", e);
                AppError::Database(format!("Failed to fetch transactions: {}", e))
            })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    #[instrument(skip(self))]
    async fn external_ref_exists(&self, account_id: &str, external_ref: &str) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM transactions
                WHERE account_id = $1 AND external_ref = $2
            )
            "#,
        )
        .bind(account_id)
        .bind(external_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error checking external ref: {}", e);
            AppError::Database(format!("Failed to check external ref: {}", e))
        })?;

        Ok(exists.0)
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    account_id: String,
    transaction_type: String,
    amount: Decimal,
    currency: String,
    status: String,
    source: Option<String>,
    call_sid: Option<String>,
    external_ref: Option<String>,
    balance_after: Decimal,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for TransactionRecord {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            transaction_type: TransactionType::from_str(&row.transaction_type)
                .unwrap_or(TransactionType::Adjustment),
            amount: row.amount,
            currency: row.currency,
            status: row.status,
            source: row.source,
            call_sid: row.call_sid,
            external_ref: row.external_ref,
            balance_after: row.balance_after,
            created_at: row.created_at,
        }
    }
}
