//! Pricing models and cost math
//!
//! Country-based wholesale prices, the markup configuration applied on top
//! of them, and the pure billing-increment cost calculator. The rounding
//! policy (round up to the next full increment, money at 4 decimal places
//! half-up) is a business contract, not an approximation.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-minute billing: every call is billed in whole-minute increments.
pub const BILLING_INCREMENT_SECS: i32 = 60;

/// Decimal places carried by all monetary rates and costs.
pub const MONEY_SCALE: u32 = 4;

/// Wholesale price row for one country
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryPrice {
    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,

    /// Human-readable country name
    pub country_name: String,

    /// Wholesale price per minute
    pub base_price: Decimal,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Default for CountryPrice {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            country_code: String::new(),
            country_name: String::new(),
            base_price: Decimal::ZERO,
            currency: "USD".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Markup configuration singleton
///
/// Effective markup for a country is
/// `max(country_overrides[code] ?? default_markup_percent, minimum_markup_percent)`;
/// the billable price is
/// `max(base_price * (1 + markup/100), minimum_final_price)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// Markup applied when no country override exists, in percent
    pub default_markup_percent: Decimal,

    /// Floor for the effective markup, in percent
    pub minimum_markup_percent: Decimal,

    /// Floor for the billable per-minute price
    pub minimum_final_price: Decimal,

    /// Per-country markup overrides, in percent
    pub country_overrides: HashMap<String, Decimal>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl MarkupConfig {
    /// Effective markup percentage for a country
    pub fn effective_markup(&self, country_code: &str) -> Decimal {
        let markup = self
            .country_overrides
            .get(country_code)
            .copied()
            .unwrap_or(self.default_markup_percent);
        markup.max(self.minimum_markup_percent)
    }

    /// Billable per-minute price for a wholesale price, rounded to 4 dp
    pub fn final_price(&self, country_code: &str, base_price: Decimal) -> Decimal {
        let markup = self.effective_markup(country_code);
        let marked_up = base_price * (Decimal::ONE + markup / Decimal::from(100));
        marked_up
            .max(self.minimum_final_price)
            .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            default_markup_percent: Decimal::from(100),
            minimum_markup_percent: Decimal::ZERO,
            // $0.15/min
            minimum_final_price: Decimal::new(15, 2),
            country_overrides: HashMap::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Billable rate resolved for a phone number or country
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRate {
    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,

    /// Country name, when known
    pub country_name: Option<String>,

    /// Wholesale price per minute the rate was derived from
    pub base_price: Decimal,

    /// Effective markup percentage applied
    pub markup_percent: Decimal,

    /// Billable price per minute
    pub final_price: Decimal,

    /// Billing increment in seconds
    pub billing_increment_secs: i32,

    /// Destination is on the unsupported-country denylist
    pub is_unsupported: bool,
}

impl ResolvedRate {
    /// Rate for a denylisted destination: valid, but never billable
    pub fn unsupported(country_code: impl Into<String>, country_name: Option<String>) -> Self {
        Self {
            country_code: country_code.into(),
            country_name,
            base_price: Decimal::ZERO,
            markup_percent: Decimal::ZERO,
            final_price: Decimal::ZERO,
            billing_increment_secs: BILLING_INCREMENT_SECS,
            is_unsupported: true,
        }
    }

    /// Cost of a call at this rate
    pub fn cost_for_duration(&self, duration_secs: i32) -> Result<Decimal, AppError> {
        compute_cost(self.final_price, duration_secs, self.billing_increment_secs)
    }
}

/// Compute the cost of a call
///
/// Duration is rounded up to the next full billing increment, converted to
/// minutes and multiplied by the per-minute rate; the result carries 4
/// decimal places, rounded half-up. Zero duration costs zero; negative
/// duration is invalid input.
pub fn compute_cost(
    rate_per_minute: Decimal,
    duration_secs: i32,
    increment_secs: i32,
) -> Result<Decimal, AppError> {
    if duration_secs < 0 {
        return Err(AppError::InvalidDuration(i64::from(duration_secs)));
    }
    if duration_secs == 0 {
        return Ok(Decimal::ZERO);
    }

    // Round up to billing increment
    let increment = increment_secs.max(1);
    let rounded_seconds = ((duration_secs + increment - 1) / increment) * increment;

    let minutes = Decimal::from(rounded_seconds) / Decimal::from(60);
    Ok((rate_per_minute * minutes)
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

/// Audit row for a base-price change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Unique identifier
    pub id: i64,

    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,

    /// Price before the change (None for a newly added country)
    pub old_price: Option<Decimal>,

    /// Price after the change
    pub new_price: Decimal,

    /// What produced the change (csv_import, admin)
    pub source: String,

    /// Large relative jump, worth a human look
    pub significant: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_compute_cost_rounds_up_to_increment() {
        // 61 seconds crosses into a second minute
        assert_eq!(compute_cost(dec!(0.02), 61, 60).unwrap(), dec!(0.04));
        // 60 seconds is exactly one increment, no over-round
        assert_eq!(compute_cost(dec!(0.02), 60, 60).unwrap(), dec!(0.02));
        // 1 second bills a full minute
        assert_eq!(compute_cost(dec!(0.02), 1, 60).unwrap(), dec!(0.02));
    }

    #[test]
    fn test_compute_cost_zero_duration() {
        assert_eq!(compute_cost(dec!(0.15), 0, 60).unwrap(), Decimal::ZERO);
        assert_eq!(compute_cost(dec!(99.99), 0, 60).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_compute_cost_negative_duration() {
        let err = compute_cost(dec!(0.15), -1, 60).unwrap_err();
        assert!(matches!(err, AppError::InvalidDuration(-1)));
    }

    #[test]
    fn test_compute_cost_monotone_in_duration() {
        let mut last = Decimal::ZERO;
        for secs in 0..=360 {
            let cost = compute_cost(dec!(0.07), secs, 60).unwrap();
            assert!(cost >= last, "cost decreased at {} secs", secs);
            last = cost;
        }
    }

    #[test]
    fn test_compute_cost_four_decimal_places() {
        // 0.0133 * 2 minutes = 0.0266
        assert_eq!(compute_cost(dec!(0.0133), 90, 60).unwrap(), dec!(0.0266));
        // Half-up at the fourth decimal: 0.00125 * 1 min = 0.0013 (not 0.0012)
        assert_eq!(compute_cost(dec!(0.00125), 60, 60).unwrap(), dec!(0.0013));
    }

    #[test]
    fn test_effective_markup_uses_override_and_floor() {
        let mut config = MarkupConfig {
            default_markup_percent: dec!(50),
            minimum_markup_percent: dec!(20),
            ..Default::default()
        };
        config.country_overrides.insert("PE".to_string(), dec!(80));
        config.country_overrides.insert("MX".to_string(), dec!(5));

        // Override wins over default
        assert_eq!(config.effective_markup("PE"), dec!(80));
        // Default when no override
        assert_eq!(config.effective_markup("US"), dec!(50));
        // Minimum floors a low override
        assert_eq!(config.effective_markup("MX"), dec!(20));
    }

    #[test]
    fn test_final_price_formula() {
        let config = MarkupConfig {
            default_markup_percent: dec!(100),
            minimum_markup_percent: dec!(0),
            minimum_final_price: dec!(0.15),
            ..Default::default()
        };

        // max(0.01 * 2.0, 0.15) = 0.15: the floor wins
        assert_eq!(config.final_price("US", dec!(0.01)), dec!(0.15));
        // max(0.20 * 2.0, 0.15) = 0.40: the markup wins
        assert_eq!(config.final_price("PE", dec!(0.20)), dec!(0.40));
    }

    #[test]
    fn test_final_price_rounds_half_up() {
        let config = MarkupConfig {
            default_markup_percent: dec!(33),
            minimum_markup_percent: dec!(0),
            minimum_final_price: dec!(0),
            ..Default::default()
        };

        // 0.0123 * 1.33 = 0.016359 -> 0.0164
        assert_eq!(config.final_price("US", dec!(0.0123)), dec!(0.0164));
    }

    #[test]
    fn test_unsupported_rate_is_free_and_flagged() {
        let rate = ResolvedRate::unsupported("KP", Some("North Korea".to_string()));
        assert!(rate.is_unsupported);
        assert_eq!(rate.final_price, Decimal::ZERO);
        assert_eq!(rate.cost_for_duration(600).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_end_to_end_us_example() {
        // base $0.01, markup 100%, minimum final $0.15 -> rate $0.15/min
        let config = MarkupConfig::default();
        let final_price = config.final_price("US", dec!(0.01));
        assert_eq!(final_price, dec!(0.15));

        // 125 s -> 3 increments -> 3 minutes -> $0.45
        let cost = compute_cost(final_price, 125, BILLING_INCREMENT_SECS).unwrap();
        assert_eq!(cost, dec!(0.45));
    }
}
