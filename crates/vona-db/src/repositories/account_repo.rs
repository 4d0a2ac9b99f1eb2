//! Account repository implementation
//!
//! PostgreSQL-backed storage for accounts. Balance mutations that must be
//! atomic with ledger writes happen inside service-level transactions; the
//! repository only covers reads, first-sight provisioning, and simple
//! balance deltas.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use vona_core::{models::Account, traits::AccountRepository, AppError, AppResult};

/// PostgreSQL implementation of AccountRepository
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Account>> {
        debug!("Finding account by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, AccountRow>(
            r#"
            SELECT id, email, balance, currency, is_admin, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding account {}: {}", id, e);
            AppError::Database(format!("Failed to find account: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_or_create(&self, id: &str, email: Option<&str>) -> AppResult<Account> {
        debug!("Ensuring account exists: {}", id);

        // ON CONFLICT DO NOTHING keeps a concurrent first-authentication
        // race harmless; the follow-up read returns whichever row won.
        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, balance)
            VALUES ($1, $2, 0)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error provisioning account {}: {}", id, e);
            AppError::Database(format!("Failed to provision account: {}", e))
        })?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    #[instrument(skip(self))]
    async fn update_balance(&self, id: &str, delta: Decimal) -> AppResult<Decimal> {
        debug!("Updating balance for account {} by {}", id, delta);

        let result: Option<(Decimal,)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET balance = balance + $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating balance for account {}: {}", id, e);
            AppError::Database(format!("Failed to update balance: {}", e))
        })?;

        result
            .map(|(balance,)| balance)
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AccountRow {
    pub(crate) id: String,
    pub(crate) email: Option<String>,
    pub(crate) balance: Decimal,
    pub(crate) currency: String,
    pub(crate) is_admin: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            balance: row.balance,
            currency: row.currency,
            is_admin: row.is_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
