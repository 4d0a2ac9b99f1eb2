//! HTTP API layer for Vona
//!
//! Request DTOs and actix-web handlers for the webhook, pricing, account
//! and admin surfaces.

pub mod dto;
pub mod handlers;

// Re-export DTOs (common types)
pub use dto::{ApiResponse, PaginationParams};

// Re-export handler configuration functions
pub use handlers::{
    configure_accounts, configure_admin, configure_health, configure_pricing, configure_webhooks,
};

use vona_db::repositories::PgPricingRepository;

/// Pricing service wired to the PostgreSQL store
pub type AppPricingService = vona_services::PricingService<PgPricingRepository>;

/// Settlement service wired to the PostgreSQL store
pub type AppSettlementService = vona_services::SettlementService<PgPricingRepository>;

/// Import service wired to the PostgreSQL store
pub type AppImportService = vona_services::ImportService<PgPricingRepository>;
