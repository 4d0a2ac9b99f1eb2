//! Call record repository implementation
//!
//! Each webhook delivery for a call SID merges into the same row. The
//! upsert carries the idempotency rules in SQL: a terminal status is never
//! regressed by a late non-terminal delivery, and a recorded cost is never
//! cleared by a later zero-cost merge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use vona_core::{
    models::{CallDirection, CallRecord, CallStatus},
    traits::CallRepository,
    AppError, AppResult,
};

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    /// Create a new call repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, call_sid, account_id, phone_number, direction,
    provider_status, status, duration_secs, cost, created_at, updated_at
"#;

#[async_trait]
impl CallRepository for PgCallRepository {
    #[instrument(skip(self))]
    async fn find_by_sid(&self, call_sid: &str) -> AppResult<Option<CallRecord>> {
        debug!("Finding call record by sid: {}", call_sid);

        let query = format!(
            "SELECT {} FROM call_records WHERE call_sid = $1",
            SELECT_COLUMNS
        );

        let result = sqlx::query_as::<sqlx::Postgres, CallRow>(&query)
            .bind(call_sid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding call {}: {}", call_sid, e);
                AppError::Database(format!("Failed to find call record: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self, record), fields(call_sid = %record.call_sid))]
    async fn merge_status(&self, record: &CallRecord) -> AppResult<()> {
        debug!(
            "Merging status {} for call {}",
            record.status, record.call_sid
        );

        // The WHERE clause only admits the update when the stored status is
        // still non-terminal or the incoming one is terminal; duration never
        // shrinks and a stored cost wins over an incoming NULL.
        sqlx::query(
            r#"
            INSERT INTO call_records (
                call_sid, account_id, phone_number, direction,
                provider_status, status, duration_secs, cost
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (call_sid) DO UPDATE
            SET provider_status = EXCLUDED.provider_status,
                status = EXCLUDED.status,
                duration_secs = GREATEST(call_records.duration_secs, EXCLUDED.duration_secs),
                cost = COALESCE(call_records.cost, EXCLUDED.cost),
                updated_at = NOW()
            WHERE call_records.status = 'unknown' OR EXCLUDED.status <> 'unknown'
            "#,
        )
        .bind(&record.call_sid)
        .bind(&record.account_id)
        .bind(&record.phone_number)
        .bind(record.direction.to_string())
        .bind(&record.provider_status)
        .bind(record.status.to_string())
        .bind(record.duration_secs)
        .bind(record.cost)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error merging call {}: {}", record.call_sid, e);
            AppError::Database(format!("Failed to merge call record: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_by_account(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<CallRecord>, i64)> {
        debug!(
            "Listing calls for account {} limit {} offset {}",
            account_id, limit, offset
        );

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM call_records WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error counting calls: {}", e);
                    AppError::Database(format!("Failed to count call records: {}", e))
                })?;

        let query = format!(
            r#"
            SELECT {}
            FROM call_records
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            SELECT_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, CallRow>(&query)
            .bind(account_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing calls: {}", e);
                AppError::Database(format!("Failed to fetch call records: {}", e))
            })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    id: i64,
    call_sid: String,
    account_id: String,
    phone_number: String,
    direction: String,
    provider_status: String,
    status: String,
    duration_secs: i32,
    cost: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CallRow> for CallRecord {
    fn from(row: CallRow) -> Self {
        Self {
            id: row.id,
            call_sid: row.call_sid,
            account_id: row.account_id,
            phone_number: row.phone_number,
            direction: CallDirection::from_str(&row.direction).unwrap_or_default(),
            provider_status: row.provider_status,
            status: CallStatus::from_str(&row.status).unwrap_or_default(),
            duration_secs: row.duration_secs,
            cost: row.cost,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
