//! Business logic services for Vona
//!
//! This crate contains the services that orchestrate billing operations:
//! rate resolution, webhook settlement, balance mutations and pricing
//! imports.
//!
//! # Architecture
//!
//! Services are designed to be composable and testable:
//! - Each service owns its dependencies (repositories, cache, pool)
//! - Services are wrapped in Arc for safe sharing across async tasks
//! - All entry points are instrumented with tracing
//! - Comprehensive error handling with AppError
//!
//! # Services
//!
//! - `PricingService` - Rate resolution with markup and caching
//! - `SettlementService` - Webhook-driven call cost settlement
//! - `BalanceService` - Deposits and admin balance overrides
//! - `ImportService` - CSV wholesale price imports

pub mod balance;
pub mod import;
pub mod pricing;
pub mod settlement;

pub use balance::{BalanceService, DepositOutcome};
pub use import::{ImportService, ImportSummary};
pub use pricing::PricingService;
pub use settlement::{CallStatusEvent, SettlementOutcome, SettlementService};

/// Business logic constants
pub mod constants {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Attempts per settlement transaction before falling back to an
    /// unbilled record
    pub const SETTLEMENT_MAX_RETRIES: u32 = 3;

    /// Countries resolved per database round trip in batch rate lookups
    pub const RATE_BATCH_CHUNK: usize = 10;

    /// Relative base-price change above which a price update is flagged
    /// for a human look (50%)
    pub const SIGNIFICANT_CHANGE_RATIO: Decimal = dec!(0.5);

    /// Audit source tag for CSV imports
    pub const PRICE_SOURCE_CSV: &str = "csv_import";

    /// Audit source tag for admin price edits
    pub const PRICE_SOURCE_ADMIN: &str = "admin";
}
