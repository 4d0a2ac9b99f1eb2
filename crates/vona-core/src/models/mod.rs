//! Domain models for Vona
//!
//! This module contains all the core domain models used throughout the application.

pub mod account;
pub mod call;
pub mod pricing;
pub mod transaction;

pub use account::Account;
pub use call::{CallDirection, CallRecord, CallStatus, ProviderStatus};
pub use pricing::{
    compute_cost, CountryPrice, MarkupConfig, PriceUpdate, ResolvedRate, BILLING_INCREMENT_SECS,
    MONEY_SCALE,
};
pub use transaction::{TransactionRecord, TransactionType};
