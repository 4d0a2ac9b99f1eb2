//! HTTP request handlers

pub mod account;
pub mod admin;
pub mod health;
pub mod pricing;
pub mod webhook;

pub use account::configure as configure_accounts;
pub use admin::configure as configure_admin;
pub use health::configure as configure_health;
pub use pricing::configure as configure_pricing;
pub use webhook::configure as configure_webhooks;

use sqlx::PgPool;
use tracing::warn;
use vona_auth::AuthenticatedUser;
use vona_core::models::Account;
use vona_core::traits::AccountRepository;
use vona_core::{AppError, AppResult};
use vona_db::repositories::PgAccountRepository;

/// Resolve the requester's account and require the admin flag on it
///
/// Admin authorization lives on the account row, not in the token: a token
/// alone can never grant admin access.
pub(crate) async fn require_admin(pool: &PgPool, user: &AuthenticatedUser) -> AppResult<Account> {
    let repo = PgAccountRepository::new(pool.clone());
    let account = repo
        .find_by_id(&user.user_id)
        .await?
        .ok_or(AppError::Forbidden)?;

    if !account.is_admin {
        warn!(user_id = %user.user_id, "Non-admin attempted admin access");
        return Err(AppError::Forbidden);
    }

    Ok(account)
}
