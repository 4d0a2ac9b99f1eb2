//! Account surface handlers
//!
//! The authenticated user's own account, ledger and call history. The
//! account row is provisioned on first sight with a zero balance.

use crate::dto::account::{AccountResponse, CallResponse, TransactionResponse};
use crate::dto::PaginationParams;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use vona_auth::AuthenticatedUser;
use vona_core::traits::{AccountRepository, CallRepository, TransactionRepository};
use vona_core::AppError;
use vona_db::repositories::{PgAccountRepository, PgCallRepository, PgTransactionRepository};
use validator::Validate;

/// Fetch (or provision) the authenticated user's account
///
/// GET /api/v1/accounts/me
#[instrument(skip(pool, user), fields(user_id = %user.user_id))]
pub async fn get_me(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let repo = PgAccountRepository::new(pool.get_ref().clone());

    let account = repo.find_or_create(&user.user_id, user.email()).await?;

    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}

/// List the authenticated user's ledger, newest first
///
/// GET /api/v1/accounts/me/transactions
#[instrument(skip(pool, user), fields(user_id = %user.user_id))]
pub async fn list_transactions(
    pool: web::Data<PgPool>,
    query: web::Query<PaginationParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    debug!(page = query.page, per_page = query.per_page, "Listing ledger");

    let repo = PgTransactionRepository::new(pool.get_ref().clone());
    let (entries, total) = repo
        .list_by_account(&user.user_id, query.limit(), query.offset())
        .await?;

    let data: Vec<TransactionResponse> = entries.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// List the authenticated user's call history, newest first
///
/// GET /api/v1/accounts/me/calls
#[instrument(skip(pool, user), fields(user_id = %user.user_id))]
pub async fn list_calls(
    pool: web::Data<PgPool>,
    query: web::Query<PaginationParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    debug!(page = query.page, per_page = query.per_page, "Listing calls");

    let repo = PgCallRepository::new(pool.get_ref().clone());
    let (records, total) = repo
        .list_by_account(&user.user_id, query.limit(), query.offset())
        .await?;

    let data: Vec<CallResponse> = records.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// Configure account routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/accounts")
            .route("/me", web::get().to(get_me))
            .route("/me/transactions", web::get().to(list_transactions))
            .route("/me/calls", web::get().to(list_calls)),
    );
}
