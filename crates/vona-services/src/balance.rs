//! Balance mutation service
//!
//! Admin absolute balance overrides and payment-confirmed deposits. Both
//! run inside one transaction under the account row lock, the same lock
//! settlement takes, so no mutation can interleave with a call charge.
//! Every mutation appends a ledger entry; the balance column stays
//! reconcilable by summing the ledger from account creation.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument, warn};
use vona_core::models::TransactionRecord;
use vona_core::{AppError, AppResult};

/// Result of a deposit credit
#[derive(Debug, Clone, PartialEq)]
pub enum DepositOutcome {
    /// Balance credited and ledger entry appended
    Credited { amount: Decimal, balance: Decimal },
    /// The payment session was already credited; nothing changed
    Duplicate { balance: Decimal },
}

/// Admin balance override result
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceAdjustment {
    /// Balance before the override
    pub previous: Decimal,
    /// Balance after the override
    pub balance: Decimal,
    /// Signed delta recorded on the ledger
    pub delta: Decimal,
}

/// Deposits and admin balance overrides
pub struct BalanceService {
    pool: PgPool,
}

impl BalanceService {
    /// Create a new balance service
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Absolute balance set (admin surface)
    ///
    /// Always appends an `adjustment` ledger entry carrying the signed
    /// delta, even a zero one, so the override is visible in the ledger.
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` for a negative target balance
    /// - `AppError::AccountNotFound` for an unknown account
    #[instrument(skip(self))]
    pub async fn set_balance(
        &self,
        account_id: &str,
        new_balance: Decimal,
    ) -> AppResult<BalanceAdjustment> {
        if new_balance < Decimal::ZERO {
            return Err(AppError::Validation(
                "Balance must be non-negative".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let previous = lock_balance(&mut tx, account_id).await?;
        let delta = new_balance - previous;

        sqlx::query("UPDATE accounts SET balance = $2, updated_at = NOW() WHERE id = $1")
            .bind(account_id)
            .bind(new_balance)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        let entry = TransactionRecord::adjustment(account_id, delta, new_balance);
        append_ledger(&mut tx, &entry).await?;

        tx.commit().await.map_err(map_db_error)?;

        info!(%previous, %new_balance, %delta, "Balance overridden");

        Ok(BalanceAdjustment {
            previous,
            balance: new_balance,
            delta,
        })
    }

    /// Credit a payment-confirmed deposit, idempotent per session id
    ///
    /// A session id already present on a prior ledger entry for the account
    /// credits nothing and reports the current balance.
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` for a non-positive amount
    /// - `AppError::AccountNotFound` for an unknown account
    #[instrument(skip(self))]
    pub async fn credit_deposit(
        &self,
        account_id: &str,
        amount: Decimal,
        session_id: &str,
    ) -> AppResult<DepositOutcome> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Deposit amount must be positive".to_string(),
            ));
        }
        if session_id.trim().is_empty() {
            return Err(AppError::Validation(
                "Payment session id is required".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let balance = lock_balance(&mut tx, account_id).await?;

        let already_credited: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM transactions
                WHERE account_id = $1 AND external_ref = $2
            )
            "#,
        )
        .bind(account_id)
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if already_credited {
            tx.commit().await.map_err(map_db_error)?;
            warn!(session_id, "Deposit session already credited");
            return Ok(DepositOutcome::Duplicate { balance });
        }

        let balance_after: Decimal = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let entry = TransactionRecord::deposit(account_id, amount, balance_after, session_id);
        append_ledger(&mut tx, &entry).await?;

        tx.commit().await.map_err(|e| {
            // The partial unique index closes the race between two
            // concurrent credits of the same session.
            if is_unique_violation(&e) {
                AppError::AlreadyExists(format!("Deposit session {}", session_id))
            } else {
                map_db_error(e)
            }
        })?;

        info!(%amount, %balance_after, session_id, "Deposit credited");

        Ok(DepositOutcome::Credited {
            amount,
            balance: balance_after,
        })
    }
}

async fn lock_balance(
    tx: &mut Transaction<'_, Postgres>,
    account_id: &str,
) -> AppResult<Decimal> {
    sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1 FOR UPDATE")
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))
}

async fn append_ledger(
    tx: &mut Transaction<'_, Postgres>,
    entry: &TransactionRecord,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            account_id, transaction_type, amount, currency,
            status, source, call_sid, external_ref, balance_after
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&entry.account_id)
    .bind(entry.transaction_type.to_string())
    .bind(entry.amount)
    .bind(&entry.currency)
    .bind(&entry.status)
    .bind(&entry.source)
    .bind(&entry.call_sid)
    .bind(&entry.external_ref)
    .bind(entry.balance_after)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyExists("Ledger entry".to_string())
        } else {
            map_db_error(e)
        }
    })?;

    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

fn map_db_error(err: sqlx::Error) -> AppError {
    AppError::Database(format!("Balance operation failed: {}", err))
}


// Needs DATABASE_URL pointing at a migrated Postgres.
#[cfg(test)]
mod integration_tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn setup(account_id: &str, balance: Decimal) -> (PgPool, BalanceService) {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let pool = PgPool::connect(&url).await.expect("connect failed");

        sqlx::query("DELETE FROM transactions WHERE account_id = $1")
            .bind(account_id)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"
            INSERT INTO accounts (id, balance)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET balance = EXCLUDED.balance
            "#,
        )
        .bind(account_id)
        .bind(balance)
        .execute(&pool)
        .await
        .unwrap();

        let service = BalanceService::new(pool.clone());
        (pool, service)
    }

    #[tokio::test]
    #[ignore] // Requires Postgres
    async fn test_override_appends_adjustment_entry() {
        let account = "balance-test-adjust";
        let (pool, service) = setup(account, dec!(10.00)).await;

        let result = service.set_balance(account, dec!(7.50)).await.unwrap();
        assert_eq!(result.previous, dec!(10.00));
        assert_eq!(result.balance, dec!(7.50));
        assert_eq!(result.delta, dec!(-2.50));

        let (ty, amount): (String, Decimal) = sqlx::query_as(
            r#"
            SELECT transaction_type, amount FROM transactions
            WHERE account_id = $1 ORDER BY id DESC LIMIT 1
            "#,
        )
        .bind(account)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(ty, "adjustment");
        assert_eq!(amount, dec!(-2.50));
    }

    #[tokio::test]
    #[ignore] // Requires Postgres
    async fn test_deposit_idempotent_per_session() {
        let account = "balance-test-deposit";
        let (pool, service) = setup(account, dec!(1.00)).await;

        let first = service
            .credit_deposit(account, dec!(10.00), "cs_test_1")
            .await
            .unwrap();
        assert_eq!(
            first,
            DepositOutcome::Credited {
                amount: dec!(10.00),
                balance: dec!(11.0000),
            }
        );

        let second = service
            .credit_deposit(account, dec!(10.00), "cs_test_1")
            .await
            .unwrap();
        assert_eq!(
            second,
            DepositOutcome::Duplicate {
                balance: dec!(11.0000),
            }
        );

        let ledger_rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE account_id = $1 AND external_ref = $2",
        )
        .bind(account)
        .bind("cs_test_1")
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(ledger_rows, 1);

        sqlx::query("DELETE FROM transactions WHERE account_id = $1")
            .bind(account)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account)
            .execute(&pool)
            .await
            .unwrap();
    }
}
