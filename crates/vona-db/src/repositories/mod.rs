//! PostgreSQL repository implementations

pub mod account_repo;
pub mod call_repo;
pub mod pricing_repo;
pub mod transaction_repo;

pub use account_repo::PgAccountRepository;
pub use call_repo::PgCallRepository;
pub use pricing_repo::PgPricingRepository;
pub use transaction_repo::PgTransactionRepository;
