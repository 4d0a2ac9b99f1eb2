//! Admin surface handlers
//!
//! Balance overrides, deposit relays, markup configuration and CSV price
//! imports. Every handler resolves the requester's account and checks its
//! admin flag before doing anything.

use crate::dto::account::{BalanceUpdateRequest, DepositRequest};
use crate::dto::pricing::{ImportResponse, MarkupResponse, MarkupUpdateRequest};
use crate::dto::ApiResponse;
use crate::{AppImportService, AppPricingService};
use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use vona_auth::AuthenticatedUser;
use vona_core::AppError;
use vona_services::{BalanceService, DepositOutcome};
use validator::Validate;

/// Absolute balance set for an account
///
/// PUT /api/v1/admin/accounts/{id}/balance
#[instrument(skip(pool, balance_service, user, req))]
pub async fn set_balance(
    pool: web::Data<PgPool>,
    balance_service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    req: web::Json<BalanceUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let admin = super::require_admin(pool.get_ref(), &user).await?;

    req.validate().map_err(|e| {
        warn!("Balance update validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let account_id = path.into_inner();
    let result = balance_service.set_balance(&account_id, req.balance).await?;

    info!(
        admin = %admin.id,
        account = %account_id,
        balance = %result.balance,
        delta = %result.delta,
        "Admin balance override"
    );

    Ok(HttpResponse::Ok().json(json!({
        "account_id": account_id,
        "previous": result.previous,
        "balance": result.balance,
        "delta": result.delta,
    })))
}

/// Credit a payment-confirmed deposit
///
/// POST /api/v1/admin/accounts/{id}/deposits
#[instrument(skip(pool, balance_service, user, req))]
pub async fn create_deposit(
    pool: web::Data<PgPool>,
    balance_service: web::Data<Arc<BalanceService>>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    req: web::Json<DepositRequest>,
) -> Result<HttpResponse, AppError> {
    let admin = super::require_admin(pool.get_ref(), &user).await?;

    req.validate().map_err(|e| {
        warn!("Deposit validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let account_id = path.into_inner();
    let outcome = balance_service
        .credit_deposit(&account_id, req.amount, &req.session_id)
        .await?;

    match outcome {
        DepositOutcome::Credited { amount, balance } => {
            info!(
                admin = %admin.id,
                account = %account_id,
                %amount,
                %balance,
                "Deposit credited"
            );
            Ok(HttpResponse::Created().json(json!({
                "account_id": account_id,
                "amount": amount,
                "balance": balance,
            })))
        }
        DepositOutcome::Duplicate { balance } => Ok(HttpResponse::Ok().json(json!({
            "account_id": account_id,
            "balance": balance,
            "message": "payment session already credited",
        }))),
    }
}

/// Read the markup configuration
///
/// GET /api/v1/admin/pricing/markup
#[instrument(skip(pool, pricing, user))]
pub async fn get_markup(
    pool: web::Data<PgPool>,
    pricing: web::Data<Arc<AppPricingService>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    super::require_admin(pool.get_ref(), &user).await?;

    let config = pricing.markup_config().await?;
    Ok(HttpResponse::Ok().json(MarkupResponse::from(config)))
}

/// Update markup configuration fields and overrides
///
/// PUT /api/v1/admin/pricing/markup
#[instrument(skip(pool, pricing, user, req))]
pub async fn update_markup(
    pool: web::Data<PgPool>,
    pricing: web::Data<Arc<AppPricingService>>,
    user: AuthenticatedUser,
    req: web::Json<MarkupUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let admin = super::require_admin(pool.get_ref(), &user).await?;

    req.validate_values().map_err(AppError::Validation)?;

    let current = pricing.markup_config().await?;
    let mut updated = req.apply_to(current);
    updated.updated_at = chrono::Utc::now();

    pricing.update_markup(&updated).await?;

    info!(admin = %admin.id, "Markup configuration updated");

    Ok(HttpResponse::Ok().json(MarkupResponse::from(updated)))
}

/// Import a CSV rate sheet
///
/// POST /api/v1/admin/pricing/import
#[instrument(skip(pool, importer, user, body))]
pub async fn import_prices(
    pool: web::Data<PgPool>,
    importer: web::Data<Arc<AppImportService>>,
    user: AuthenticatedUser,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let admin = super::require_admin(pool.get_ref(), &user).await?;

    let csv = std::str::from_utf8(&body)
        .map_err(|_| AppError::InvalidInput("CSV body is not valid UTF-8".to_string()))?;

    let summary = importer.import_csv(csv).await?;

    info!(
        admin = %admin.id,
        imported = summary.imported,
        updated = summary.updated,
        skipped = summary.skipped,
        "Price import applied"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(ImportResponse::from(summary))))
}

/// Configure admin routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/accounts/{id}/balance", web::put().to(set_balance))
            .route("/accounts/{id}/deposits", web::post().to(create_deposit))
            .route("/pricing/markup", web::get().to(get_markup))
            .route("/pricing/markup", web::put().to(update_markup))
            .route("/pricing/import", web::post().to(import_prices)),
    );
}
