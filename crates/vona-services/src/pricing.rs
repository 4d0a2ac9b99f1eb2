//! Pricing resolution service
//!
//! Resolves billable per-minute rates for phone numbers and countries:
//! dial-plan lookup, wholesale price, markup formula, with Redis caching in
//! front of the store. Cache failures fall through to the database.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use vona_cache::keys::{rate_key, MARKUP_CONFIG_KEY, MARKUP_TTL_SECS, RATE_TTL_SECS};
use vona_cache::RedisCache;
use vona_core::dialplan;
use vona_core::models::{CountryPrice, MarkupConfig, ResolvedRate, BILLING_INCREMENT_SECS};
use vona_core::traits::{CacheService, PricingRepository};
use vona_core::{AppError, AppResult};

use crate::constants::{RATE_BATCH_CHUNK, SIGNIFICANT_CHANGE_RATIO};

/// Rate resolution with markup and caching
///
/// The cache is optional: without Redis every lookup goes to the store,
/// which is correct, just slower.
pub struct PricingService<P: PricingRepository> {
    repo: Arc<P>,
    cache: Option<Arc<RedisCache>>,
}

impl<P: PricingRepository> PricingService<P> {
    /// Create a new pricing service
    pub fn new(repo: Arc<P>, cache: Option<Arc<RedisCache>>) -> Self {
        Self { repo, cache }
    }

    /// Resolve the billable rate for a dialed phone number
    ///
    /// # Errors
    ///
    /// - `AppError::PhoneParse` when no country can be determined
    /// - `AppError::RateNotFound` when the country has no wholesale price
    #[instrument(skip(self))]
    pub async fn resolve_rate(&self, phone: &str) -> AppResult<ResolvedRate> {
        let country = dialplan::country_for_number(phone)?;

        if country.is_unsupported() {
            debug!(country = country.code, "Destination on denylist");
            return Ok(ResolvedRate::unsupported(
                country.code,
                Some(country.name.to_string()),
            ));
        }

        self.resolve_rate_for_country(country.code).await
    }

    /// Resolve the billable rate for an ISO country code
    #[instrument(skip(self))]
    pub async fn resolve_rate_for_country(&self, country_code: &str) -> AppResult<ResolvedRate> {
        if dialplan::is_unsupported(country_code) {
            return Ok(ResolvedRate::unsupported(country_code.to_string(), None));
        }

        let price = self
            .find_price(country_code)
            .await?
            .ok_or_else(|| AppError::RateNotFound(country_code.to_string()))?;

        let config = self.markup_config().await?;
        Ok(Self::build_rate(&price, &config))
    }

    /// Resolve rates for a set of countries, batched in chunks
    ///
    /// A failed lookup for one country is logged and omitted; it never
    /// aborts the rest of the batch.
    #[instrument(skip(self, country_codes), fields(count = country_codes.len()))]
    pub async fn resolve_rates_for_countries(
        &self,
        country_codes: &[String],
    ) -> AppResult<HashMap<String, ResolvedRate>> {
        let config = self.markup_config().await?;
        let mut rates = HashMap::with_capacity(country_codes.len());

        for chunk in country_codes.chunks(RATE_BATCH_CHUNK) {
            let lookup: Vec<String> = chunk
                .iter()
                .filter(|code| {
                    if dialplan::is_unsupported(code) {
                        rates.insert(
                            code.to_string(),
                            ResolvedRate::unsupported(code.to_string(), None),
                        );
                        false
                    } else {
                        true
                    }
                })
                .cloned()
                .collect();

            if lookup.is_empty() {
                continue;
            }

            match self.repo.find_prices(&lookup).await {
                Ok(prices) => {
                    for price in prices {
                        let rate = Self::build_rate(&price, &config);
                        rates.insert(price.country_code.clone(), rate);
                    }
                }
                Err(e) => {
                    warn!(error = %e, countries = ?lookup, "Batch price lookup failed");
                }
            }
        }

        Ok(rates)
    }

    /// Load the markup configuration, cache-aside
    ///
    /// The cache TTL bounds how long admin markup edits can stay invisible
    /// to pricing.
    pub async fn markup_config(&self) -> AppResult<MarkupConfig> {
        if let Some(config) = self.cache_get::<MarkupConfig>(MARKUP_CONFIG_KEY).await {
            return Ok(config);
        }

        let config = self.repo.markup_config().await?;
        self.cache_set(MARKUP_CONFIG_KEY, &config, MARKUP_TTL_SECS)
            .await;
        Ok(config)
    }

    /// Replace the markup configuration and invalidate its cache entry
    #[instrument(skip(self, config))]
    pub async fn update_markup(&self, config: &MarkupConfig) -> AppResult<()> {
        self.repo.update_markup_config(config).await?;
        self.cache_delete(MARKUP_CONFIG_KEY).await;
        Ok(())
    }

    /// Apply a wholesale price change: upsert, audit, cache invalidation
    ///
    /// Returns the previous price when the country already had one. The
    /// audit row is flagged significant when the relative change exceeds
    /// the review threshold.
    #[instrument(skip(self))]
    pub async fn apply_price(
        &self,
        country_code: &str,
        country_name: &str,
        base_price: Decimal,
        source: &str,
    ) -> AppResult<Option<Decimal>> {
        let old_price = self
            .repo
            .upsert_price(country_code, country_name, base_price)
            .await?;

        let significant = match old_price {
            Some(old) if !old.is_zero() => {
                ((base_price - old) / old).abs() > SIGNIFICANT_CHANGE_RATIO
            }
            _ => false,
        };

        self.repo
            .record_price_update(country_code, old_price, base_price, source, significant)
            .await?;

        self.cache_delete(&rate_key(country_code)).await;

        Ok(old_price)
    }

    async fn find_price(&self, country_code: &str) -> AppResult<Option<CountryPrice>> {
        let key = rate_key(country_code);

        if let Some(price) = self.cache_get::<CountryPrice>(&key).await {
            debug!(country = country_code, "Price cache HIT");
            return Ok(Some(price));
        }

        let price = self.repo.find_price(country_code).await?;

        if let Some(ref p) = price {
            self.cache_set(&key, p, RATE_TTL_SECS).await;
        }

        Ok(price)
    }

    fn build_rate(price: &CountryPrice, config: &MarkupConfig) -> ResolvedRate {
        ResolvedRate {
            country_code: price.country_code.clone(),
            country_name: Some(price.country_name.clone()),
            base_price: price.base_price,
            markup_percent: config.effective_markup(&price.country_code),
            final_price: config.final_price(&price.country_code, price.base_price),
            billing_increment_secs: BILLING_INCREMENT_SECS,
            is_unsupported: false,
        }
    }

    async fn cache_get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get::<T>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, falling through");
                None
            }
        }
    }

    async fn cache_set<T: serde::Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: u64) {
        if let Some(cache) = self.cache.as_ref() {
            if let Err(e) = cache.set(key, value, ttl).await {
                warn!(key, error = %e, "Cache write failed");
            }
        }
    }

    async fn cache_delete(&self, key: &str) {
        if let Some(cache) = self.cache.as_ref() {
            if let Err(e) = cache.delete(key).await {
                warn!(key, error = %e, "Cache invalidation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use vona_core::models::PriceUpdate;

    #[derive(Default)]
    struct MockPricingRepo {
        prices: HashMap<String, CountryPrice>,
        markup: MarkupConfig,
        audits: Mutex<Vec<(String, Option<Decimal>, Decimal, String, bool)>>,
    }

    impl MockPricingRepo {
        fn with_price(mut self, code: &str, name: &str, base: Decimal) -> Self {
            self.prices.insert(
                code.to_string(),
                CountryPrice {
                    country_code: code.to_string(),
                    country_name: name.to_string(),
                    base_price: base,
                    ..Default::default()
                },
            );
            self
        }
    }

    #[async_trait]
    impl PricingRepository for MockPricingRepo {
        async fn find_price(&self, country_code: &str) -> AppResult<Option<CountryPrice>> {
            Ok(self.prices.get(country_code).cloned())
        }

        async fn find_prices(&self, country_codes: &[String]) -> AppResult<Vec<CountryPrice>> {
            Ok(country_codes
                .iter()
                .filter_map(|c| self.prices.get(c).cloned())
                .collect())
        }

        async fn upsert_price(
            &self,
            country_code: &str,
            _country_name: &str,
            _base_price: Decimal,
        ) -> AppResult<Option<Decimal>> {
            Ok(self.prices.get(country_code).map(|p| p.base_price))
        }

        async fn markup_config(&self) -> AppResult<MarkupConfig> {
            Ok(self.markup.clone())
        }

        async fn update_markup_config(&self, _config: &MarkupConfig) -> AppResult<()> {
            Ok(())
        }

        async fn record_price_update(
            &self,
            country_code: &str,
            old_price: Option<Decimal>,
            new_price: Decimal,
            source: &str,
            significant: bool,
        ) -> AppResult<()> {
            self.audits.lock().unwrap().push((
                country_code.to_string(),
                old_price,
                new_price,
                source.to_string(),
                significant,
            ));
            Ok(())
        }

        async fn list_price_updates(
            &self,
            _country_code: &str,
            _limit: i64,
        ) -> AppResult<Vec<PriceUpdate>> {
            Ok(vec![])
        }
    }

    fn markup(default: Decimal, minimum_final: Decimal) -> MarkupConfig {
        MarkupConfig {
            default_markup_percent: default,
            minimum_markup_percent: Decimal::ZERO,
            minimum_final_price: minimum_final,
            country_overrides: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    fn service(repo: MockPricingRepo) -> PricingService<MockPricingRepo> {
        PricingService::new(Arc::new(repo), None)
    }

    #[tokio::test]
    async fn test_resolve_rate_applies_markup_and_floor() {
        let repo = MockPricingRepo {
            markup: markup(dec!(100), dec!(0.15)),
            ..Default::default()
        }
        .with_price("US", "United States", dec!(0.01));

        let rate = service(repo).resolve_rate("+12125551234").await.unwrap();

        assert_eq!(rate.country_code, "US");
        assert_eq!(rate.base_price, dec!(0.01));
        assert_eq!(rate.markup_percent, dec!(100));
        // max(0.01 * 2.0, 0.15) = 0.15
        assert_eq!(rate.final_price, dec!(0.15));
        assert!(!rate.is_unsupported);
    }

    #[tokio::test]
    async fn test_resolve_rate_unknown_country() {
        let repo = MockPricingRepo {
            markup: markup(dec!(100), dec!(0.15)),
            ..Default::default()
        };

        let result = service(repo).resolve_rate("+51999888777").await;
        assert!(matches!(result, Err(AppError::RateNotFound(code)) if code == "PE"));
    }

    #[tokio::test]
    async fn test_resolve_rate_denylisted_destination() {
        let repo = MockPricingRepo {
            markup: markup(dec!(100), dec!(0.15)),
            ..Default::default()
        };

        // North Korea (+850)
        let rate = service(repo).resolve_rate("+850212345678").await.unwrap();
        assert!(rate.is_unsupported);
        assert_eq!(rate.final_price, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_resolve_rate_unparseable_number() {
        let repo = MockPricingRepo {
            markup: markup(dec!(100), dec!(0.15)),
            ..Default::default()
        };

        let result = service(repo).resolve_rate("not a number").await;
        assert!(matches!(result, Err(AppError::PhoneParse(_))));
    }

    #[tokio::test]
    async fn test_batch_omits_missing_countries() {
        let repo = MockPricingRepo {
            markup: markup(dec!(50), dec!(0)),
            ..Default::default()
        }
        .with_price("PE", "Peru", dec!(0.20))
        .with_price("MX", "Mexico", dec!(0.10));

        let codes = vec!["PE".to_string(), "MX".to_string(), "ZZ".to_string()];
        let rates = service(repo)
            .resolve_rates_for_countries(&codes)
            .await
            .unwrap();

        assert_eq!(rates.len(), 2);
        assert_eq!(rates["PE"].final_price, dec!(0.30));
        assert!(!rates.contains_key("ZZ"));
    }

    #[tokio::test]
    async fn test_batch_marks_denylisted() {
        let repo = MockPricingRepo {
            markup: markup(dec!(50), dec!(0)),
            ..Default::default()
        };

        let codes = vec!["KP".to_string()];
        let rates = service(repo)
            .resolve_rates_for_countries(&codes)
            .await
            .unwrap();

        assert!(rates["KP"].is_unsupported);
    }

    #[tokio::test]
    async fn test_apply_price_flags_significant_change() {
        let repo = MockPricingRepo {
            markup: markup(dec!(100), dec!(0.15)),
            ..Default::default()
        }
        .with_price("PE", "Peru", dec!(0.10));
        let repo = Arc::new(repo);
        let svc = PricingService::new(repo.clone(), None);

        // 0.10 -> 0.20 is a 100% jump
        let old = svc
            .apply_price("PE", "Peru", dec!(0.20), "csv_import")
            .await
            .unwrap();
        assert_eq!(old, Some(dec!(0.10)));

        let audits = repo.audits.lock().unwrap();
        let (code, old, new, source, significant) = audits.last().unwrap().clone();
        assert_eq!(code, "PE");
        assert_eq!(old, Some(dec!(0.10)));
        assert_eq!(new, dec!(0.20));
        assert_eq!(source, "csv_import");
        assert!(significant);
    }

    #[tokio::test]
    async fn test_apply_price_new_country_not_significant() {
        let repo = Arc::new(MockPricingRepo {
            markup: markup(dec!(100), dec!(0.15)),
            ..Default::default()
        });
        let svc = PricingService::new(repo.clone(), None);

        let old = svc
            .apply_price("BR", "Brazil", dec!(0.05), "admin")
            .await
            .unwrap();
        assert_eq!(old, None);

        let audits = repo.audits.lock().unwrap();
        assert!(!audits.last().unwrap().4);
    }
}
