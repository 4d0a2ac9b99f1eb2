//! Pricing handlers
//!
//! Rate lookups for the dialer UI and the admin batch surface.

use crate::dto::pricing::{BatchRatesRequest, RateQuery, RateResponse};
use crate::AppPricingService;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use vona_auth::AuthenticatedUser;
use vona_core::AppError;
use validator::Validate;

/// Resolve the rate for a phone number, optionally with a call cost
///
/// GET /api/v1/pricing/rate?phone=...&duration=...
#[instrument(skip(pricing, _user))]
pub async fn get_rate(
    pricing: web::Data<Arc<AppPricingService>>,
    query: web::Query<RateQuery>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Rate query validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    debug!(phone = %query.phone, duration = ?query.duration, "Resolving rate");

    let rate = pricing.resolve_rate(&query.phone).await?;

    let mut response = RateResponse::from(rate.clone());
    if let Some(duration) = query.duration {
        let duration = i32::try_from(duration)
            .map_err(|_| AppError::InvalidDuration(duration))?;
        response = response.with_cost(rate.cost_for_duration(duration)?);
    }

    Ok(HttpResponse::Ok().json(response))
}

/// Resolve rates for a set of countries (admin surface)
///
/// POST /api/v1/pricing/rates/batch
#[instrument(skip(pool, pricing, user, req))]
pub async fn batch_rates(
    pool: web::Data<PgPool>,
    pricing: web::Data<Arc<AppPricingService>>,
    user: AuthenticatedUser,
    req: web::Json<BatchRatesRequest>,
) -> Result<HttpResponse, AppError> {
    super::require_admin(pool.get_ref(), &user).await?;

    req.validate().map_err(|e| {
        warn!("Batch rate validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let codes = req.normalized_codes();
    debug!(count = codes.len(), "Resolving batch rates");

    let rates = pricing.resolve_rates_for_countries(&codes).await?;
    let response: HashMap<String, RateResponse> = rates
        .into_iter()
        .map(|(code, rate)| (code, RateResponse::from(rate)))
        .collect();

    Ok(HttpResponse::Ok().json(response))
}

/// Configure pricing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/pricing")
            .route("/rate", web::get().to(get_rate))
            .route("/rates/batch", web::post().to(batch_rates)),
    );
}
