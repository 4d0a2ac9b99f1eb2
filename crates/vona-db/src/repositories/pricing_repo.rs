//! Pricing store repository implementation
//!
//! Country wholesale prices, the markup configuration singleton with its
//! per-country overrides, and the price-change audit log. The settlement
//! pipeline only ever reads from here; writes come from CSV import and the
//! admin surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{debug, error, instrument};
use vona_core::{
    models::{CountryPrice, MarkupConfig, PriceUpdate},
    traits::PricingRepository,
    AppError, AppResult,
};

/// PostgreSQL implementation of PricingRepository
pub struct PgPricingRepository {
    pool: PgPool,
}

impl PgPricingRepository {
    /// Create a new pricing repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PricingRepository for PgPricingRepository {
    #[instrument(skip(self))]
    async fn find_price(&self, country_code: &str) -> AppResult<Option<CountryPrice>> {
        debug!("Finding price for country: {}", country_code);

        let result = sqlx::query_as::<sqlx::Postgres, CountryPriceRow>(
            r#"
            SELECT country_code, country_name, base_price, currency, created_at, updated_at
            FROM country_prices
            WHERE country_code = $1
            "#,
        )
        .bind(country_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding price for {}: {}", country_code, e);
            AppError::Database(format!("Failed to find country price: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self, country_codes), fields(count = country_codes.len()))]
    async fn find_prices(&self, country_codes: &[String]) -> AppResult<Vec<CountryPrice>> {
        debug!("Finding prices for {} countries", country_codes.len());

        let rows = sqlx::query_as::<sqlx::Postgres, CountryPriceRow>(
            r#"
            SELECT country_code, country_name, base_price, currency, created_at, updated_at
            FROM country_prices
            WHERE country_code = ANY($1)
            "#,
        )
        .bind(country_codes)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding prices: {}", e);
            AppError::Database(format!("Failed to fetch country prices: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn upsert_price(
        &self,
        country_code: &str,
        country_name: &str,
        base_price: Decimal,
    ) -> AppResult<Option<Decimal>> {
        debug!("Upserting price for {}: {}", country_code, base_price);

        // Returns the pre-update price so callers can audit the change;
        // NULL means the country is new.
        let result: (Option<Decimal>,) = sqlx::query_as(
            r#"
            INSERT INTO country_prices (country_code, country_name, base_price)
            VALUES ($1, $2, $3)
            ON CONFLICT (country_code) DO UPDATE
            SET country_name = EXCLUDED.country_name,
                base_price = EXCLUDED.base_price,
                updated_at = NOW()
            RETURNING (
                SELECT base_price FROM country_prices prev
                WHERE prev.country_code = $1
            )
            "#,
        )
        .bind(country_code)
        .bind(country_name)
        .bind(base_price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error upserting price for {}: {}", country_code, e);
            AppError::Database(format!("Failed to upsert country price: {}", e))
        })?;

        Ok(result.0)
    }

    #[instrument(skip(self))]
    async fn markup_config(&self) -> AppResult<MarkupConfig> {
        let config_row = sqlx::query_as::<sqlx::Postgres, MarkupConfigRow>(
            r#"
            SELECT default_markup_percent, minimum_markup_percent,
                   minimum_final_price, updated_at
            FROM markup_config
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error loading markup config: {}", e);
            AppError::Database(format!("Failed to load markup config: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound("markup config".to_string()))?;

        let overrides: Vec<(String, Decimal)> =
            sqlx::query_as("SELECT country_code, markup_percent FROM markup_overrides")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error loading markup overrides: {}", e);
                    AppError::Database(format!("Failed to load markup overrides: {}", e))
                })?;

        Ok(MarkupConfig {
            default_markup_percent: config_row.default_markup_percent,
            minimum_markup_percent: config_row.minimum_markup_percent,
            minimum_final_price: config_row.minimum_final_price,
            country_overrides: overrides.into_iter().collect::<HashMap<_, _>>(),
            updated_at: config_row.updated_at,
        })
    }

    #[instrument(skip(self, config))]
    async fn update_markup_config(&self, config: &MarkupConfig) -> AppResult<()> {
        debug!("Updating markup config");

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE markup_config
            SET default_markup_percent = $1,
                minimum_markup_percent = $2,
                minimum_final_price = $3,
                updated_at = NOW()
            WHERE id = 1
            "#,
        )
        .bind(config.default_markup_percent)
        .bind(config.minimum_markup_percent)
        .bind(config.minimum_final_price)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error updating markup config: {}", e);
            AppError::Database(format!("Failed to update markup config: {}", e))
        })?;

        sqlx::query("DELETE FROM markup_overrides")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error clearing markup overrides: {}", e);
                AppError::Database(format!("Failed to clear markup overrides: {}", e))
            })?;

        for (country_code, markup_percent) in &config.country_overrides {
            sqlx::query(
                r#"
                INSERT INTO markup_overrides (country_code, markup_percent)
                VALUES ($1, $2)
                "#,
            )
            .bind(country_code)
            .bind(markup_percent)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error inserting markup override: {}", e);
                AppError::Database(format!("Failed to insert markup override: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_price_update(
        &self,
        country_code: &str,
        old_price: Option<Decimal>,
        new_price: Decimal,
        source: &str,
        significant: bool,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO price_updates (country_code, old_price, new_price, source, significant)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(country_code)
        .bind(old_price)
        .bind(new_price)
        .bind(source)
        .bind(significant)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error recording price update: {}", e);
            AppError::Database(format!("Failed to record price update: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_price_updates(
        &self,
        country_code: &str,
        limit: i64,
    ) -> AppResult<Vec<PriceUpdate>> {
        let rows = sqlx::query_as::<sqlx::Postgres, PriceUpdateRow>(
            r#"
            SELECT id, country_code, old_price, new_price, source, significant, created_at
            FROM price_updates
            WHERE country_code = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(country_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing price updates: {}", e);
            AppError::Database(format!("Failed to fetch price updates: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct CountryPriceRow {
    country_code: String,
    country_name: String,
    base_price: Decimal,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CountryPriceRow> for CountryPrice {
    fn from(row: CountryPriceRow) -> Self {
        Self {
            country_code: row.country_code,
            country_name: row.country_name,
            base_price: row.base_price,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MarkupConfigRow {
    default_markup_percent: Decimal,
    minimum_markup_percent: Decimal,
    minimum_final_price: Decimal,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PriceUpdateRow {
    id: i64,
    country_code: String,
    old_price: Option<Decimal>,
    new_price: Decimal,
    source: String,
    significant: bool,
    created_at: DateTime<Utc>,
}

impl From<PriceUpdateRow> for PriceUpdate {
    fn from(row: PriceUpdateRow) -> Self {
        Self {
            id: row.id,
            country_code: row.country_code,
            old_price: row.old_price,
            new_price: row.new_price,
            source: row.source,
            significant: row.significant,
            created_at: row.created_at,
        }
    }
}
