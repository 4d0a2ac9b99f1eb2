//! Vona Database Layer
//!
//! This crate provides PostgreSQL database access and repository
//! implementations for the Vona billing backend. It includes:
//!
//! - Connection pool management with sqlx
//! - Repository implementations for accounts, calls, the ledger, and pricing
//! - Upsert queries that preserve the call-record idempotency guarantees

pub mod pool;
pub mod repositories;

pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use sqlx::{PgPool, Postgres, Transaction};
pub use vona_core::{AppError, AppResult};
