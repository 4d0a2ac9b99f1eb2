//! Common traits for repositories and services
//!
//! Defines abstractions for database access so services can be tested
//! against in-memory implementations.

use crate::error::AppError;
use crate::models::{
    Account, CallRecord, CountryPrice, MarkupConfig, PriceUpdate, TransactionRecord,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};

/// Account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find account by id (identity provider subject)
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, AppError>;

    /// Fetch the account for a subject, creating it with a zero balance on
    /// first sight. Settlement never calls this; only the authenticated
    /// account surface does.
    async fn find_or_create(&self, id: &str, email: Option<&str>) -> Result<Account, AppError>;

    /// Apply a signed delta to the balance, returning the new balance
    async fn update_balance(&self, id: &str, delta: Decimal) -> Result<Decimal, AppError>;
}

/// Call record repository trait
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Find a call record by provider call SID
    async fn find_by_sid(&self, call_sid: &str) -> Result<Option<CallRecord>, AppError>;

    /// Merge a status delivery into the record for its SID.
    ///
    /// Single atomic upsert: creates the record when missing, otherwise
    /// merges fields without regressing a terminal status to a non-terminal
    /// one and without clearing an already-recorded cost.
    async fn merge_status(&self, record: &CallRecord) -> Result<(), AppError>;

    /// List calls for an account, newest first
    async fn list_by_account(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CallRecord>, i64), AppError>;
}

/// Ledger repository trait
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Append a ledger entry
    async fn append(&self, entry: &TransactionRecord) -> Result<TransactionRecord, AppError>;

    /// List ledger entries for an account, newest first
    async fn list_by_account(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TransactionRecord>, i64), AppError>;

    /// Whether a deposit with this external payment-session id already exists
    async fn external_ref_exists(
        &self,
        account_id: &str,
        external_ref: &str,
    ) -> Result<bool, AppError>;
}

/// Pricing store trait: country prices plus the markup singleton
#[async_trait]
pub trait PricingRepository: Send + Sync {
    /// Wholesale price row for a country
    async fn find_price(&self, country_code: &str) -> Result<Option<CountryPrice>, AppError>;

    /// Wholesale price rows for a set of countries
    async fn find_prices(&self, country_codes: &[String]) -> Result<Vec<CountryPrice>, AppError>;

    /// Insert or update a wholesale price, returning the previous price if
    /// the country already existed
    async fn upsert_price(
        &self,
        country_code: &str,
        country_name: &str,
        base_price: Decimal,
    ) -> Result<Option<Decimal>, AppError>;

    /// Load the markup configuration singleton with its country overrides
    async fn markup_config(&self) -> Result<MarkupConfig, AppError>;

    /// Replace the markup configuration and its country overrides
    async fn update_markup_config(&self, config: &MarkupConfig) -> Result<(), AppError>;

    /// Append a base-price change to the audit log
    async fn record_price_update(
        &self,
        country_code: &str,
        old_price: Option<Decimal>,
        new_price: Decimal,
        source: &str,
        significant: bool,
    ) -> Result<(), AppError>;

    /// Recent price-change audit rows for a country
    async fn list_price_updates(
        &self,
        country_code: &str,
        limit: i64,
    ) -> Result<Vec<PriceUpdate>, AppError>;
}

/// Cache service trait
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Get value from cache
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Set value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    /// Delete value from cache
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool, AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), 10);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(0, 10);
        assert_eq!(p.page, 1);

        let p = Pagination::new(1, 2000);
        assert_eq!(p.per_page, 1000);
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(95, 1, 10);
        assert_eq!(meta.total_pages, 10);

        let meta = PaginationMeta::new(101, 1, 10);
        assert_eq!(meta.total_pages, 11);
    }
}
