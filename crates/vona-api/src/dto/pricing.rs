//! Pricing DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::{Validate, ValidationError};
use vona_core::models::{MarkupConfig, ResolvedRate};
use vona_services::ImportSummary;

/// Query parameters for a single rate lookup
///
/// GET /api/v1/pricing/rate?phone=+51999888777&duration=125
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateQuery {
    /// Dialed phone number
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,

    /// Optional call duration; when present the response carries the cost
    #[validate(range(min = 0, message = "duration must be non-negative"))]
    pub duration: Option<i64>,
}

/// Body for a batch rate lookup
///
/// POST /api/v1/pricing/rates/batch
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BatchRatesRequest {
    /// ISO 3166-1 alpha-2 country codes
    #[validate(length(min = 1, max = 100), custom(function = "validate_country_codes"))]
    pub country_codes: Vec<String>,
}

fn validate_country_codes(codes: &[String]) -> Result<(), ValidationError> {
    for code in codes {
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::new("country_code")
                .with_message(format!("invalid country code '{}'", code).into()));
        }
    }
    Ok(())
}

impl BatchRatesRequest {
    /// Codes uppercased for lookup
    pub fn normalized_codes(&self) -> Vec<String> {
        self.country_codes
            .iter()
            .map(|c| c.to_uppercase())
            .collect()
    }
}

/// A resolved billable rate
#[derive(Debug, Clone, Serialize)]
pub struct RateResponse {
    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,
    /// Country name when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    /// Billable price per minute
    pub final_price: Decimal,
    /// Effective markup percentage applied
    pub markup_percent: Decimal,
    /// Billing increment in seconds
    pub billing_increment_secs: i32,
    /// Destination is on the unsupported-country denylist
    pub is_unsupported: bool,
    /// Cost for the requested duration, when one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
}

impl From<ResolvedRate> for RateResponse {
    fn from(rate: ResolvedRate) -> Self {
        Self {
            country_code: rate.country_code,
            country_name: rate.country_name,
            final_price: rate.final_price,
            markup_percent: rate.markup_percent,
            billing_increment_secs: rate.billing_increment_secs,
            is_unsupported: rate.is_unsupported,
            cost: None,
        }
    }
}

impl RateResponse {
    /// Attach the cost for a requested duration
    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// Markup configuration as exposed to admins
#[derive(Debug, Clone, Serialize)]
pub struct MarkupResponse {
    /// Markup applied when no country override exists, in percent
    pub default_markup_percent: Decimal,
    /// Floor for the effective markup, in percent
    pub minimum_markup_percent: Decimal,
    /// Floor for the billable per-minute price
    pub minimum_final_price: Decimal,
    /// Per-country markup overrides, in percent
    pub country_overrides: HashMap<String, Decimal>,
    /// Last update timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<MarkupConfig> for MarkupResponse {
    fn from(config: MarkupConfig) -> Self {
        Self {
            default_markup_percent: config.default_markup_percent,
            minimum_markup_percent: config.minimum_markup_percent,
            minimum_final_price: config.minimum_final_price,
            country_overrides: config.country_overrides,
            updated_at: config.updated_at,
        }
    }
}

/// Partial markup update; absent fields keep their current value
///
/// PUT /api/v1/admin/pricing/markup
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MarkupUpdateRequest {
    pub default_markup_percent: Option<Decimal>,
    pub minimum_markup_percent: Option<Decimal>,
    pub minimum_final_price: Option<Decimal>,
    /// Full replacement for the override map when present
    pub country_overrides: Option<HashMap<String, Decimal>>,
}

impl MarkupUpdateRequest {
    /// Merge this update over the current configuration
    pub fn apply_to(&self, mut config: MarkupConfig) -> MarkupConfig {
        if let Some(v) = self.default_markup_percent {
            config.default_markup_percent = v;
        }
        if let Some(v) = self.minimum_markup_percent {
            config.minimum_markup_percent = v;
        }
        if let Some(v) = self.minimum_final_price {
            config.minimum_final_price = v;
        }
        if let Some(ref overrides) = self.country_overrides {
            config.country_overrides = overrides
                .iter()
                .map(|(k, v)| (k.to_uppercase(), *v))
                .collect();
        }
        config
    }

    /// All present values must be non-negative percentages/prices
    pub fn validate_values(&self) -> Result<(), String> {
        let non_negative = |v: Option<Decimal>, field: &str| {
            if v.is_some_and(|v| v < Decimal::ZERO) {
                Err(format!("{} must be non-negative", field))
            } else {
                Ok(())
            }
        };

        non_negative(self.default_markup_percent, "default_markup_percent")?;
        non_negative(self.minimum_markup_percent, "minimum_markup_percent")?;
        non_negative(self.minimum_final_price, "minimum_final_price")?;

        if let Some(ref overrides) = self.country_overrides {
            for (code, markup) in overrides {
                if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(format!("invalid country code '{}'", code));
                }
                if *markup < Decimal::ZERO {
                    return Err(format!("markup for {} must be non-negative", code));
                }
            }
        }
        Ok(())
    }
}

/// CSV import result counts
#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
    /// Countries added
    pub imported: u32,
    /// Countries whose price changed
    pub updated: u32,
    /// Rows dropped
    pub skipped: u32,
    /// Row-level error messages
    pub errors: Vec<String>,
}

impl From<ImportSummary> for ImportResponse {
    fn from(summary: ImportSummary) -> Self {
        Self {
            imported: summary.imported,
            updated: summary.updated,
            skipped: summary.skipped,
            errors: summary.errors,
        }
    }
}
