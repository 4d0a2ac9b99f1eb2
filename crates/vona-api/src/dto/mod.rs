//! Request and response DTOs

pub mod account;
pub mod common;
pub mod pricing;
pub mod webhook;

pub use common::{ApiResponse, PaginationParams};
